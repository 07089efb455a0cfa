//! Creates the first ADMIN account, or promotes an existing one. No API
//! route grants ADMIN, so every deployment starts here.
//!
//! ```text
//! SEED_ADMIN_EMAIL=root@blog.example SEED_ADMIN_PASSWORD=... cargo run -p seed
//! ```

use std::collections::BTreeSet;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use auth_adapters::Argon2Hasher;
use domains::models::{BanState, Profile, Role, User, UserId};
use domains::ports::{PasswordHasher, ProfileRepository, UserRepository};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, PartialEq, Eq)]
enum Seeded {
    Created(UserId),
    Promoted(UserId),
}

async fn seed_admin(
    users: &dyn UserRepository,
    profiles: &dyn ProfileRepository,
    hasher: &dyn PasswordHasher,
    email: &str,
    password: &str,
) -> anyhow::Result<Seeded> {
    let email = email.trim().to_lowercase();
    anyhow::ensure!(email.contains('@'), "SEED_ADMIN_EMAIL is not an email address");
    anyhow::ensure!(
        password.chars().count() >= MIN_PASSWORD_LEN,
        "SEED_ADMIN_PASSWORD must be at least {MIN_PASSWORD_LEN} characters"
    );

    let now = Utc::now();
    if let Some(mut user) = users.find_by_email(&email).await? {
        anyhow::ensure!(!user.anonymized, "{email} belongs to a deleted account");
        user.roles.extend([Role::User, Role::Author, Role::Admin]);
        user.email_verified = true;
        user.verification = None;
        user.updated_at = now;
        let id = user.id;
        users.replace(user).await?;
        return Ok(Seeded::Promoted(id));
    }

    let id = UserId::new();
    users
        .insert(User {
            id,
            name: "admin".to_string(),
            email,
            password_hash: hasher.hash(password)?,
            roles: BTreeSet::from([Role::User, Role::Author, Role::Admin]),
            ban: BanState::default(),
            email_verified: true,
            verification: None,
            anonymized: false,
            created_at: now,
            updated_at: now,
        })
        .await?;
    profiles.insert(Profile::empty(id)).await?;
    Ok(Seeded::Created(id))
}

#[cfg(feature = "db-postgres")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use secrecy::ExposeSecret;

    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = configs::Settings::load().context("failed to load settings")?;
    let email = std::env::var("SEED_ADMIN_EMAIL").context("SEED_ADMIN_EMAIL is not set")?;
    let password = std::env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD is not set")?;

    let store = storage_adapters::PostgresStore::connect(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
    )
    .await?;

    match seed_admin(&store, &store, &Argon2Hasher::default(), &email, &password).await? {
        Seeded::Created(id) => info!(user_id = %id, "admin account created"),
        Seeded::Promoted(id) => info!(user_id = %id, "existing account promoted to admin"),
    }
    Ok(())
}

#[cfg(not(feature = "db-postgres"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("seed only makes sense against a persistent store; build with `db-postgres`")
}
