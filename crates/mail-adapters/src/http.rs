//! Mail relay client. The relay accepts `{to, subject, text}` as JSON and
//! authenticates with a bearer key.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use domains::ports::Mailer;

use crate::verification_link;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    text: String,
}

pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
    api_key: SecretString,
    from: String,
    public_base_url: String,
}

impl HttpMailer {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: SecretString,
        from: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.into(),
            api_key,
            from: from.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn message<'a>(&'a self, to: &'a str, key: &str) -> RelayMessage<'a> {
        let link = verification_link(&self.public_base_url, key);
        RelayMessage {
            to,
            from: &self.from,
            subject: "Confirm your email",
            text: format!("Follow this link to confirm your account:\n\n{link}\n"),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification(&self, to: &str, key: &str) -> anyhow::Result<()> {
        let res = self
            .client
            .post(&self.relay_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.message(to, key))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("mail relay request failed: {e}"))?;

        res.error_for_status()
            .map_err(|e| anyhow::anyhow!("mail relay rejected message: {e}"))?;
        tracing::debug!(to, "verification mail relayed");
        Ok(())
    }
}
