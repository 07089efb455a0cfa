//! Shared fixtures: a full service graph over the in-memory store with
//! deterministic crypto and a mailer that remembers what it sent.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use auth_adapters::Argon2Hasher;
use domains::models::{BanState, Principal, Profile, Role, User, UserId};
use domains::ports::{
    Mailer, ProfileRepository, TokenClaims, TokenIssuer, UserRepository,
};
use domains::TokenError;
use services::{Primitives, Repositories, SecurityOptions, Services};
use storage_adapters::MemoryStore;

/// Bearer tokens are the user id in clear.
pub struct IdTokens;

impl TokenIssuer for IdTokens {
    fn issue(&self, principal: &Principal) -> anyhow::Result<String> {
        Ok(principal.id.to_string())
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let user_id = token.parse().map_err(|_| TokenError::Invalid)?;
        Ok(TokenClaims { user_id, roles: Vec::new() })
    }
}

/// Records `(to, key)` for every verification mail.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send_verification(&self, to: &str, key: &str) -> anyhow::Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), key.to_string()));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub services: Services,
    pub store: Arc<MemoryStore>,
    pub outbox: Arc<Outbox>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let outbox = Arc::new(Outbox::default());
        let repos = Repositories {
            users: store.clone(),
            articles: store.clone(),
            categories: store.clone(),
            comments: store.clone(),
            profiles: store.clone(),
        };
        let primitives = Primitives {
            hasher: Arc::new(Argon2Hasher::default()),
            tokens: Arc::new(IdTokens),
            mailer: outbox.clone(),
        };
        Self {
            services: Services::new(repos, primitives, SecurityOptions::default()),
            store,
            outbox,
        }
    }

    /// Stores a verified account holding `roles` and returns it as a principal.
    pub async fn principal(&self, roles: &[Role]) -> Principal {
        self.principal_with_ban(roles, BanState::default()).await
    }

    pub async fn principal_with_ban(&self, roles: &[Role], ban: BanState) -> Principal {
        let now = Utc::now();
        let id = UserId::new();
        let user = User {
            id,
            name: format!("user-{}", id.0.simple()),
            email: format!("{}@blog.test", id.0.simple()),
            password_hash: String::new(),
            roles: roles.iter().copied().collect::<BTreeSet<_>>(),
            ban,
            email_verified: true,
            verification: None,
            anonymized: false,
            created_at: now,
            updated_at: now,
        };
        let principal = Principal::from(&user);
        UserRepository::insert(self.store.as_ref(), user)
            .await
            .expect("fresh user id");
        ProfileRepository::insert(self.store.as_ref(), Profile::empty(id))
            .await
            .expect("fresh profile");
        principal
    }

    pub async fn user(&self, id: UserId) -> User {
        UserRepository::find_by_id(self.store.as_ref(), id)
            .await
            .expect("store is infallible")
            .expect("user exists")
    }

    /// Mail is dispatched on a spawned task; give it a chance to run.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

pub fn article_payload(title: &str, categories: &[String]) -> Value {
    json!({
        "title": title,
        "description": "a short description",
        "content": [{ "type": "p", "content": "hello" }],
        "categories": categories,
    })
}

pub fn category_payload(title: &str) -> Value {
    json!({ "title": title, "description": "about things" })
}
