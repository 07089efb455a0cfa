//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the binary.
//! Repositories behave like a document store: find, insert, update-by-filter
//! and delete-by-filter, each atomic for a single document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{StoreError, TokenError};
use crate::models::{
    Article, ArticleId, ArticlePatch, BanState, Category, CategoryId, Comment, CommentId,
    LikeState, Page, Principal, Profile, Role, User, UserId,
};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_verification_key(&self, key: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `UniqueViolation("email")` when the address is taken.
    async fn insert(&self, user: User) -> Result<(), StoreError>;

    /// Replaces the whole document matching `user.id`.
    async fn replace(&self, user: User) -> Result<(), StoreError>;

    /// Removes the document and frees its e-mail. Only used to undo a
    /// registration whose profile could not be created.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    /// Escalates the ban state in place (see `BanState::escalated`) and
    /// returns the new state, or `None` for an unknown user. The read and
    /// the write are one step so concurrent bans each count.
    async fn record_ban(
        &self,
        id: UserId,
        minutes: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<BanState>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError>;
    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError>;

    /// Newest first. `category` restricts to articles referencing it.
    async fn list(
        &self,
        page: Page,
        category: Option<CategoryId>,
    ) -> Result<Vec<Article>, StoreError>;

    /// Fails with `UniqueViolation("slug")`; this is the authoritative slug guard.
    async fn insert(&self, article: Article) -> Result<(), StoreError>;

    /// Applies the patch in one write and returns the updated document.
    async fn apply_patch(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
        at: DateTime<Utc>,
    ) -> Result<Option<Article>, StoreError>;

    /// Removes the article and every comment attached to it.
    async fn delete_cascade(&self, id: ArticleId) -> Result<bool, StoreError>;

    /// Atomic set-add / set-remove of `user` in the likers set.
    async fn toggle_like(
        &self,
        id: ArticleId,
        user: UserId,
    ) -> Result<Option<LikeState>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Returns the category whatever its lifecycle state.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;

    /// Only categories that are not soft-deleted.
    async fn find_active_by_ids(&self, ids: Vec<CategoryId>) -> Result<Vec<Category>, StoreError>;

    async fn exists_with_slug_or_title(&self, slug: &str, title: &str)
        -> Result<bool, StoreError>;

    /// Non-deleted categories ordered by title.
    async fn list_active(&self) -> Result<Vec<Category>, StoreError>;

    async fn insert(&self, category: Category) -> Result<(), StoreError>;

    /// Replaces the document only while the stored one is still live.
    /// Returns `false` when it is missing or already soft-deleted, so a
    /// stale copy can never bring a deleted category back.
    async fn replace(&self, category: Category) -> Result<bool, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, StoreError>;

    /// Ordered by like count, most liked first.
    async fn list_for_article(&self, article: ArticleId) -> Result<Vec<Comment>, StoreError>;

    async fn insert(&self, comment: Comment) -> Result<(), StoreError>;

    /// Writes text, revision history, lifecycle state and `updated_at`.
    /// Likes are left untouched so concurrent toggles are not lost.
    ///
    /// Compare-and-set: applies only while the stored comment is live and
    /// its `updated_at` still equals `prior`. Returns `false` otherwise.
    async fn save_revision(&self, comment: Comment, prior: DateTime<Utc>)
        -> Result<bool, StoreError>;

    async fn toggle_like(
        &self,
        id: CommentId,
        user: UserId,
    ) -> Result<Option<LikeState>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_user(&self, user: UserId) -> Result<Option<Profile>, StoreError>;
    async fn insert(&self, profile: Profile) -> Result<(), StoreError>;
    async fn replace(&self, profile: Profile) -> Result<(), StoreError>;
    async fn delete_by_user(&self, user: UserId) -> Result<bool, StoreError>;
}

/// Opaque password hashing primitive.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> anyhow::Result<String>;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// What a verified bearer token says about its holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: UserId,
    /// Roles at issuance time; the live record is authoritative.
    pub roles: Vec<Role>,
}

/// Opaque token issuance primitive.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, principal: &Principal) -> anyhow::Result<String>;
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// Outbound mail. Callers treat delivery as best-effort.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, key: &str) -> anyhow::Result<()>;
}
