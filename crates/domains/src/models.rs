//! # Domain Models
//!
//! These structs represent the core entities of the blog.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::UnknownRole;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Identifies a registered principal.
    UserId
);
entity_id!(ArticleId);
entity_id!(CategoryId);
entity_id!(CommentId);

/// Closed set of role tags a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Author,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Author => "AUTHOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts both `AUTHOR` and the legacy `ROLE_AUTHOR` spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("ROLE_") {
            "USER" => Ok(Role::User),
            "AUTHOR" => Ok(Role::Author),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Ban bookkeeping carried by every principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanState {
    /// Active ban expiry; `None` when the account was never banned.
    pub banned_until: Option<DateTime<Utc>>,
    /// Number of bans ever applied. Only ever grows.
    pub ban_count: u32,
}

impl BanState {
    /// Ban count from which a ban no longer expires.
    pub const PERMANENT_THRESHOLD: u32 = 3;

    /// Far-future timestamp standing in for "never expires".
    pub fn permanent_expiry() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(99_999_999_999_999).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Next state after a ban of `minutes`. The counter never decreases and
    /// the third ban is permanent whatever was requested.
    pub fn escalated(&self, minutes: u32, now: DateTime<Utc>) -> BanState {
        let ban_count = self.ban_count.saturating_add(1);
        let banned_until = if ban_count >= Self::PERMANENT_THRESHOLD {
            Self::permanent_expiry()
        } else {
            now.checked_add_signed(Duration::minutes(i64::from(minutes)))
                .unwrap_or_else(Self::permanent_expiry)
        };
        BanState {
            banned_until: Some(banned_until),
            ban_count,
        }
    }
}

/// Pending e-mail verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A registered account. Never hard-deleted: see [`User::anonymize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// PHC-formatted password hash; deliberately not serializable.
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    pub ban: BanState,
    pub email_verified: bool,
    pub verification: Option<VerificationKey>,
    pub anonymized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const ANONYMIZED_NAME: &'static str = "[Profile deleted]";

    /// Overwrites personal data in place. The row survives so that
    /// authored content keeps a valid owner reference.
    pub fn anonymize(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.name = Self::ANONYMIZED_NAME.to_string();
        self.email = format!(
            "{}{}@maildeleted.invalid",
            now.format("%Y-%m-%dT%H-%M-%S"),
            Uuid::new_v4().simple()
        );
        self.password_hash = password_hash;
        self.roles.clear();
        self.verification = None;
        self.anonymized = true;
        self.updated_at = now;
    }
}

/// The authenticated actor a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub roles: BTreeSet<Role>,
    pub ban: BanState,
}

impl Principal {
    pub fn has_tag(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            roles: user.roles.clone(),
            ban: user.ban.clone(),
        }
    }
}

/// One typed piece of an article body, e.g. `{ "type": "p", "content": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Soft-delete state machine: `Active -> Deleted`, one way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted,
}

impl Lifecycle {
    pub fn is_deleted(self) -> bool {
        matches!(self, Lifecycle::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    /// Set at creation, never changes.
    pub owner: UserId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub blocks: Vec<Block>,
    pub categories: Vec<CategoryId>,
    pub likes: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial article update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub blocks: Option<Vec<Block>>,
    pub categories: Option<Vec<CategoryId>>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.blocks.is_none()
            && self.categories.is_none()
    }

    pub fn apply(&self, article: &mut Article, at: DateTime<Utc>) {
        if let Some(title) = &self.title {
            article.title = title.clone();
        }
        // An empty description clears the field, as it does on create.
        if let Some(description) = &self.description {
            article.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if let Some(blocks) = &self.blocks {
            article.blocks = blocks.clone();
        }
        if let Some(categories) = &self.categories {
            article.categories = categories.clone();
        }
        article.updated_at = at;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub state: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub const DELETED_TITLE: &'static str = "[Category deleted]";
    pub const DELETED_DESCRIPTION: &'static str = "Category deleted";

    /// Overwrites the public fields with placeholders and flags the record.
    /// The slug becomes a fresh unique value so the old one can be reused.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        let marker = Uuid::new_v4().simple();
        self.title = format!("{} {}", Self::DELETED_TITLE, marker);
        self.slug = format!("deleted-{marker}");
        self.description = Some(Self::DELETED_DESCRIPTION.to_string());
        self.state = Lifecycle::Deleted;
        self.updated_at = now;
    }
}

/// Previous text of a comment together with the time it was last modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub text: String,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub article: ArticleId,
    pub author: UserId,
    pub text: String,
    pub revisions: Vec<Revision>,
    pub state: Lifecycle,
    pub likes: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub const DELETED_TEXT: &'static str = "Comment deleted";

    /// Appends the current text to the history, then overwrites it.
    pub fn revise(&mut self, text: String, now: DateTime<Utc>) {
        let previous = std::mem::replace(&mut self.text, text);
        self.revisions.push(Revision {
            text: previous,
            modified_at: self.updated_at,
        });
        self.updated_at = now;
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.revise(Self::DELETED_TEXT.to_string(), now);
        self.state = Lifecycle::Deleted;
    }
}

/// Outcome of an atomic like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserId,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub twitch: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub youtube: Option<String>,
}

impl Profile {
    /// Names of the free-text fields a profile edit may touch.
    pub const FIELDS: [&'static str; 7] = [
        "bio",
        "avatar",
        "twitch",
        "twitter",
        "instagram",
        "tiktok",
        "youtube",
    ];

    pub fn empty(user: UserId) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "bio" => Some(&mut self.bio),
            "avatar" => Some(&mut self.avatar),
            "twitch" => Some(&mut self.twitch),
            "twitter" => Some(&mut self.twitter),
            "instagram" => Some(&mut self.instagram),
            "tiktok" => Some(&mut self.tiktok),
            "youtube" => Some(&mut self.youtube),
            _ => None,
        }
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 10;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(number: Option<u32>, size: Option<u32>) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(Self::DEFAULT_SIZE).clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}
