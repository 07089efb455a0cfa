use async_trait::async_trait;

use domains::ports::Mailer;

use crate::verification_link;

/// Writes verification links to the log instead of sending mail.
#[derive(Debug, Clone)]
pub struct LogMailer {
    public_base_url: String,
}

impl LogMailer {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self { public_base_url: public_base_url.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, key: &str) -> anyhow::Result<()> {
        let link = verification_link(&self.public_base_url, key);
        tracing::info!(to, link = %link, "verification mail");
        Ok(())
    }
}
