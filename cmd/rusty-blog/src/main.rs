//! # rusty-blog
//!
//! Assembles the blog from the adapters selected at compile time and the
//! settings found at runtime.

use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api_adapters::{router, AppState};
use auth_adapters::Argon2Hasher;
use configs::{LogSettings, Settings, StoreBackend};
use domains::ports::Mailer;
use mail_adapters::LogMailer;
use services::{Primitives, Repositories, SecurityOptions, Services};
use storage_adapters::MemoryStore;

#[cfg(not(all(feature = "web-axum", feature = "auth-jwt")))]
compile_error!("rusty-blog needs the `web-axum` and `auth-jwt` features");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(&settings.log);

    let services = Services::new(
        repositories(&settings).await?,
        primitives(&settings),
        SecurityOptions {
            verification_ttl: settings.verification_ttl(),
        },
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let app = router(AppState::new(services)).layer(cors);

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    info!(%addr, backend = ?settings.store.backend, "rusty-blog listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("received error from running server")?;
    info!("shut down cleanly");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn repositories(settings: &Settings) -> anyhow::Result<Repositories> {
    match settings.store.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store, data is lost on restart");
            let store = Arc::new(MemoryStore::default());
            Ok(Repositories {
                users: store.clone(),
                articles: store.clone(),
                categories: store.clone(),
                comments: store.clone(),
                profiles: store,
            })
        }
        #[cfg(feature = "db-postgres")]
        StoreBackend::Postgres => {
            use secrecy::ExposeSecret;

            let store = storage_adapters::PostgresStore::connect(
                settings.database.url.expose_secret(),
                settings.database.max_connections,
            )
            .await?;
            let store = Arc::new(store);
            Ok(Repositories {
                users: store.clone(),
                articles: store.clone(),
                categories: store.clone(),
                comments: store.clone(),
                profiles: store,
            })
        }
        #[cfg(not(feature = "db-postgres"))]
        StoreBackend::Postgres => {
            anyhow::bail!("store.backend = postgres needs a build with the `db-postgres` feature")
        }
    }
}

fn primitives(settings: &Settings) -> Primitives {
    Primitives {
        hasher: Arc::new(Argon2Hasher::default()),
        tokens: Arc::new(auth_adapters::JwtIssuer::new(
            &settings.auth.jwt_secret,
            settings.token_ttl(),
        )),
        mailer: mailer(settings),
    }
}

fn mailer(settings: &Settings) -> Arc<dyn Mailer> {
    let mail = &settings.mail;
    if let Some(relay) = relay_mailer(settings) {
        return relay;
    }
    if mail.relay_url.is_some() {
        warn!("mail.relay_url is set but this build lacks `mail-http`; logging mail instead");
    }
    Arc::new(LogMailer::new(mail.public_base_url.clone()))
}

#[cfg(feature = "mail-http")]
fn relay_mailer(settings: &Settings) -> Option<Arc<dyn Mailer>> {
    let mail = &settings.mail;
    let (relay_url, api_key) = (mail.relay_url.as_ref()?, mail.api_key.as_ref()?);
    info!(%relay_url, "verification mail goes through the HTTP relay");
    Some(Arc::new(mail_adapters::HttpMailer::new(
        relay_url.clone(),
        api_key.clone(),
        mail.sender.clone(),
        mail.public_base_url.clone(),
    )))
}

#[cfg(not(feature = "mail-http"))]
fn relay_mailer(_settings: &Settings) -> Option<Arc<dyn Mailer>> {
    None
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to listen for SIGTERM"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
