//! rusty-blog/crates/configs/src/lib.rs
//!
//! Layered settings. Later sources win:
//!
//! 1. built-in defaults
//! 2. `config/default.toml`
//! 3. `config/{APP_ENV}.toml`
//! 4. `.env` (loaded into the process environment)
//! 5. `BLOG__SECTION__KEY` environment variables

use std::collections::HashMap;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_minutes: i64,
    pub verification_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    pub sender: String,
    pub public_base_url: String,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub json: bool,
    pub filter: String,
}

impl Settings {
    /// Reads every source, including the real process environment.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self::build(&env, None)
    }

    /// `vars` replaces the process environment when given, which keeps
    /// tests independent of each other.
    fn build(run_mode: &str, vars: Option<HashMap<String, String>>) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("store.backend", "memory")?
            .set_default("database.url", "postgres://localhost/rusty_blog")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_ttl_minutes", 60)?
            .set_default("auth.verification_ttl_minutes", 5)?
            .set_default("mail.sender", "no-reply@localhost")?
            .set_default("mail.public_base_url", "http://localhost:8080")?
            .set_default("log.json", false)?
            .set_default("log.filter", "info,tower_http=debug")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                Environment::with_prefix("BLOG")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;

        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(SettingsError::Invalid { key: "auth.jwt_secret", reason: "must not be empty" });
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(SettingsError::Invalid { key: "auth.token_ttl_minutes", reason: "must be positive" });
        }
        if self.auth.verification_ttl_minutes <= 0 {
            return Err(SettingsError::Invalid {
                key: "auth.verification_ttl_minutes",
                reason: "must be positive",
            });
        }
        if self.mail.relay_url.is_some() && self.mail.api_key.is_none() {
            return Err(SettingsError::Invalid { key: "mail.api_key", reason: "required with mail.relay_url" });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auth.token_ttl_minutes)
    }

    pub fn verification_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auth.verification_ttl_minutes)
    }
}
