//! rusty-blog/crates/services/src/lib.rs
//!
//! Validation, authorization and the mutation pipelines. Everything here
//! talks to storage, crypto and mail through the `domains` ports only.

use std::sync::Arc;

use chrono::Utc;

use domains::models::Principal;
use domains::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, Mailer, PasswordHasher,
    ProfileRepository, TokenIssuer, UserRepository,
};
use domains::{AppError, Result};

pub mod admin;
pub mod articles;
pub mod authorization;
pub mod categories;
pub mod comments;
pub mod profiles;
pub mod references;
pub mod sanitize;
pub mod security;
pub mod slug;
pub mod validation;

pub use admin::AdminService;
pub use articles::{ArticleService, ArticleView};
pub use categories::CategoryService;
pub use comments::CommentService;
pub use profiles::{ProfileService, ProfileView};
pub use security::{Registered, SecurityOptions, SecurityService};

/// Rejects a principal whose ban is still running.
pub(crate) fn ensure_active(principal: &Principal) -> Result<()> {
    if authorization::is_banned(&principal.ban, Utc::now()) {
        return Err(AppError::Banned);
    }
    Ok(())
}

/// Every repository port, as handed over by the binary.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

/// Crypto and mail primitives.
#[derive(Clone)]
pub struct Primitives {
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub mailer: Arc<dyn Mailer>,
}

/// All pipelines, wired once at startup and shared by request handlers.
#[derive(Clone)]
pub struct Services {
    pub articles: ArticleService,
    pub categories: CategoryService,
    pub comments: CommentService,
    pub security: SecurityService,
    pub profiles: ProfileService,
    pub admin: AdminService,
}

impl Services {
    pub fn new(repos: Repositories, primitives: Primitives, options: SecurityOptions) -> Self {
        Self {
            articles: ArticleService::new(
                repos.articles.clone(),
                repos.categories.clone(),
                repos.comments.clone(),
            ),
            categories: CategoryService::new(repos.articles.clone(), repos.categories.clone()),
            comments: CommentService::new(
                repos.articles.clone(),
                repos.categories.clone(),
                repos.comments.clone(),
            ),
            security: SecurityService::new(
                repos.users.clone(),
                repos.profiles.clone(),
                primitives.hasher,
                primitives.tokens,
                primitives.mailer,
                options,
            ),
            profiles: ProfileService::new(repos.users.clone(), repos.profiles),
            admin: AdminService::new(repos.users),
        }
    }
}
