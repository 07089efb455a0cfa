//! # PostgreSQL document store
//!
//! Maps the relational schema in `migrations/` onto the domain models.
//! Atomic single-document operations (like toggles, patches, cascades) are
//! each one SQL statement; the unique constraints are the authoritative
//! guard for e-mails, slugs and category titles.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use domains::models::{
    Article, ArticleId, ArticlePatch, BanState, Block, Category, CategoryId, Comment, CommentId,
    Lifecycle, LikeState, Page, Profile, Revision, Role, User, UserId, VerificationKey,
};
use domains::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, ProfileRepository, UserRepository,
};
use domains::StoreError;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "postgres store ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translates constraint violations into the field they protect.
fn store_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(name) if name.contains("email") => "email",
                Some(name) if name.contains("title") => "title",
                Some(name) if name.contains("slug") => "slug",
                _ => "id",
            };
            return StoreError::UniqueViolation(field.to_string());
        }
    }
    StoreError::Backend(err.into())
}

fn lifecycle(deleted: bool) -> Lifecycle {
    if deleted {
        Lifecycle::Deleted
    } else {
        Lifecycle::Active
    }
}

fn user_ids(raw: Vec<Uuid>) -> BTreeSet<UserId> {
    raw.into_iter().map(UserId).collect()
}

fn raw_ids(ids: &BTreeSet<UserId>) -> Vec<Uuid> {
    ids.iter().map(|id| id.0).collect()
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let roles: Vec<String> = row.try_get("roles")?;
    let key: Option<String> = row.try_get("verification_key")?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("verification_expires_at")?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        roles: roles.iter().filter_map(|r| r.parse::<Role>().ok()).collect(),
        ban: ban_from_row(row)?,
        email_verified: row.try_get("email_verified")?,
        verification: key
            .zip(expires_at)
            .map(|(key, expires_at)| VerificationKey { key, expires_at }),
        anonymized: row.try_get("anonymized")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn article_from_row(row: &PgRow) -> Result<Article, sqlx::Error> {
    let blocks: Json<Vec<Block>> = row.try_get("blocks")?;
    let categories: Vec<Uuid> = row.try_get("category_ids")?;
    Ok(Article {
        id: ArticleId(row.try_get("id")?),
        owner: UserId(row.try_get("owner_id")?),
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        blocks: blocks.0,
        categories: categories.into_iter().map(CategoryId).collect(),
        likes: user_ids(row.try_get("likes")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: CategoryId(row.try_get("id")?),
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        state: lifecycle(row.try_get("deleted")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, sqlx::Error> {
    let revisions: Json<Vec<Revision>> = row.try_get("revisions")?;
    Ok(Comment {
        id: CommentId(row.try_get("id")?),
        article: ArticleId(row.try_get("article_id")?),
        author: UserId(row.try_get("author_id")?),
        text: row.try_get("text")?,
        revisions: revisions.0,
        state: lifecycle(row.try_get("deleted")?),
        likes: user_ids(row.try_get("likes")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn profile_from_row(row: &PgRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        user: UserId(row.try_get("user_id")?),
        bio: row.try_get("bio")?,
        avatar: row.try_get("avatar")?,
        twitch: row.try_get("twitch")?,
        twitter: row.try_get("twitter")?,
        instagram: row.try_get("instagram")?,
        tiktok: row.try_get("tiktok")?,
        youtube: row.try_get("youtube")?,
    })
}

fn ban_from_row(row: &PgRow) -> Result<BanState, sqlx::Error> {
    let ban_count: i32 = row.try_get("ban_count")?;
    Ok(BanState {
        banned_until: row.try_get("banned_until")?,
        ban_count: u32::try_from(ban_count).unwrap_or_default(),
    })
}

fn like_state(row: &PgRow) -> Result<LikeState, sqlx::Error> {
    let count: i32 = row.try_get("like_count")?;
    Ok(LikeState {
        liked: row.try_get("liked")?,
        likes: usize::try_from(count).unwrap_or_default(),
    })
}

const TOGGLE_ARTICLE_LIKE: &str = "UPDATE articles
    SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2) ELSE array_append(likes, $2) END
    WHERE id = $1
    RETURNING ($2 = ANY(likes)) AS liked, cardinality(likes) AS like_count";

const TOGGLE_COMMENT_LIKE: &str = "UPDATE comments
    SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2) ELSE array_append(likes, $2) END
    WHERE id = $1
    RETURNING ($2 = ANY(likes)) AS liked, cardinality(likes) AS like_count";

/// Increment and expiry in one statement; the right-hand side sees the old count.
const RECORD_BAN: &str = "UPDATE users
    SET ban_count = ban_count + 1,
        banned_until = CASE WHEN ban_count + 1 >= $3 THEN $4 ELSE $5 END,
        updated_at = $2
    WHERE id = $1
    RETURNING banned_until, ban_count";

#[async_trait]
impl UserRepository for PostgresStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(user_from_row).transpose().map_err(store_err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(user_from_row).transpose().map_err(store_err)
    }

    async fn find_by_verification_key(&self, key: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE verification_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(user_from_row).transpose().map_err(store_err)
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let roles: Vec<&str> = user.roles.iter().map(Role::as_str).collect();
        let (key, expires_at) = user
            .verification
            .map(|v| (Some(v.key), Some(v.expires_at)))
            .unwrap_or_default();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, roles, banned_until, ban_count,
                email_verified, verification_key, verification_expires_at, anonymized, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(user.ban.banned_until)
        .bind(i32::try_from(user.ban.ban_count).unwrap_or(i32::MAX))
        .bind(user.email_verified)
        .bind(key)
        .bind(expires_at)
        .bind(user.anonymized)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn replace(&self, user: User) -> Result<(), StoreError> {
        let roles: Vec<&str> = user.roles.iter().map(Role::as_str).collect();
        let (key, expires_at) = user
            .verification
            .map(|v| (Some(v.key), Some(v.expires_at)))
            .unwrap_or_default();
        sqlx::query(
            "UPDATE users SET name = $2, email = $3, password_hash = $4, roles = $5,
                banned_until = $6, ban_count = $7, email_verified = $8, verification_key = $9,
                verification_expires_at = $10, anonymized = $11, updated_at = $12
             WHERE id = $1",
        )
        .bind(user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(user.ban.banned_until)
        .bind(i32::try_from(user.ban.ban_count).unwrap_or(i32::MAX))
        .bind(user.email_verified)
        .bind(key)
        .bind(expires_at)
        .bind(user.anonymized)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_ban(
        &self,
        id: UserId,
        minutes: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<BanState>, StoreError> {
        let timed = at
            .checked_add_signed(Duration::minutes(i64::from(minutes)))
            .unwrap_or_else(BanState::permanent_expiry);
        let row = sqlx::query(RECORD_BAN)
            .bind(id.0)
            .bind(at)
            .bind(i32::try_from(BanState::PERMANENT_THRESHOLD).unwrap_or(i32::MAX))
            .bind(BanState::permanent_expiry())
            .bind(timed)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(ban_from_row).transpose().map_err(store_err)
    }
}

#[async_trait]
impl ArticleRepository for PostgresStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        let row = sqlx::query("SELECT * FROM articles WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(article_from_row).transpose().map_err(store_err)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM articles WHERE slug = $1) AS taken")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        row.try_get("taken").map_err(store_err)
    }

    async fn list(
        &self,
        page: Page,
        category: Option<CategoryId>,
    ) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM articles
             WHERE $1::uuid IS NULL OR $1 = ANY(category_ids)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(category.map(|c| c.0))
        .bind(i64::from(page.size))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(article_from_row)
            .collect::<Result<_, _>>()
            .map_err(store_err)
    }

    async fn insert(&self, article: Article) -> Result<(), StoreError> {
        let categories: Vec<Uuid> = article.categories.iter().map(|c| c.0).collect();
        sqlx::query(
            "INSERT INTO articles (id, owner_id, title, slug, description, blocks, category_ids, likes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(article.id.0)
        .bind(article.owner.0)
        .bind(&article.title)
        .bind(&article.slug)
        .bind(&article.description)
        .bind(Json(&article.blocks))
        .bind(&categories)
        .bind(raw_ids(&article.likes))
        .bind(article.created_at)
        .bind(article.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn apply_patch(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
        at: DateTime<Utc>,
    ) -> Result<Option<Article>, StoreError> {
        let categories: Option<Vec<Uuid>> = patch
            .categories
            .map(|ids| ids.into_iter().map(|c| c.0).collect());
        let row = sqlx::query(
            "UPDATE articles SET
                title = COALESCE($2, title),
                description = CASE WHEN $3::text IS NULL THEN description ELSE NULLIF($3, '') END,
                blocks = COALESCE($4, blocks),
                category_ids = COALESCE($5, category_ids),
                updated_at = $6
             WHERE id = $1
             RETURNING *",
        )
        .bind(id.0)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.blocks.map(Json))
        .bind(categories)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.as_ref().map(article_from_row).transpose().map_err(store_err)
    }

    async fn delete_cascade(&self, id: ArticleId) -> Result<bool, StoreError> {
        // comments.article_id is ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        debug!(article_id = %id, rows = result.rows_affected(), "article cascade delete");
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_like(
        &self,
        id: ArticleId,
        user: UserId,
    ) -> Result<Option<LikeState>, StoreError> {
        let row = sqlx::query(TOGGLE_ARTICLE_LIKE)
            .bind(id.0)
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(like_state).transpose().map_err(store_err)
    }
}

#[async_trait]
impl CategoryRepository for PostgresStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(category_from_row).transpose().map_err(store_err)
    }

    async fn find_active_by_ids(&self, ids: Vec<CategoryId>) -> Result<Vec<Category>, StoreError> {
        let ids: Vec<Uuid> = ids.into_iter().map(|c| c.0).collect();
        let rows = sqlx::query("SELECT * FROM categories WHERE id = ANY($1) AND NOT deleted")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(category_from_row)
            .collect::<Result<_, _>>()
            .map_err(store_err)
    }

    async fn exists_with_slug_or_title(
        &self,
        slug: &str,
        title: &str,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE slug = $1 OR title = $2) AS taken",
        )
        .bind(slug)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        row.try_get("taken").map_err(store_err)
    }

    async fn list_active(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT * FROM categories WHERE NOT deleted ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(category_from_row)
            .collect::<Result<_, _>>()
            .map_err(store_err)
    }

    async fn insert(&self, category: Category) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO categories (id, title, slug, description, deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(category.id.0)
        .bind(&category.title)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.state.is_deleted())
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn replace(&self, category: Category) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE categories SET title = $2, slug = $3, description = $4, deleted = $5, updated_at = $6
             WHERE id = $1 AND NOT deleted",
        )
        .bind(category.id.0)
        .bind(&category.title)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.state.is_deleted())
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentRepository for PostgresStore {
    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(comment_from_row).transpose().map_err(store_err)
    }

    async fn list_for_article(&self, article: ArticleId) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM comments WHERE article_id = $1
             ORDER BY cardinality(likes) DESC, created_at ASC",
        )
        .bind(article.0)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(comment_from_row)
            .collect::<Result<_, _>>()
            .map_err(store_err)
    }

    async fn insert(&self, comment: Comment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO comments (id, article_id, author_id, text, revisions, deleted, likes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(comment.id.0)
        .bind(comment.article.0)
        .bind(comment.author.0)
        .bind(&comment.text)
        .bind(Json(&comment.revisions))
        .bind(comment.state.is_deleted())
        .bind(raw_ids(&comment.likes))
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn save_revision(
        &self,
        comment: Comment,
        prior: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE comments SET text = $2, revisions = $3, deleted = $4, updated_at = $5
             WHERE id = $1 AND NOT deleted AND updated_at = $6",
        )
        .bind(comment.id.0)
        .bind(&comment.text)
        .bind(Json(&comment.revisions))
        .bind(comment.state.is_deleted())
        .bind(comment.updated_at)
        .bind(prior)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_like(
        &self,
        id: CommentId,
        user: UserId,
    ) -> Result<Option<LikeState>, StoreError> {
        let row = sqlx::query(TOGGLE_COMMENT_LIKE)
            .bind(id.0)
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(like_state).transpose().map_err(store_err)
    }
}

#[async_trait]
impl ProfileRepository for PostgresStore {
    async fn find_by_user(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(profile_from_row).transpose().map_err(store_err)
    }

    async fn insert(&self, profile: Profile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profiles (user_id, bio, avatar, twitch, twitter, instagram, tiktok, youtube)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(profile.user.0)
        .bind(&profile.bio)
        .bind(&profile.avatar)
        .bind(&profile.twitch)
        .bind(&profile.twitter)
        .bind(&profile.instagram)
        .bind(&profile.tiktok)
        .bind(&profile.youtube)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn replace(&self, profile: Profile) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE profiles SET bio = $2, avatar = $3, twitch = $4, twitter = $5,
                instagram = $6, tiktok = $7, youtube = $8
             WHERE user_id = $1",
        )
        .bind(profile.user.0)
        .bind(&profile.bio)
        .bind(&profile.avatar)
        .bind(&profile.twitch)
        .bind(&profile.twitter)
        .bind(&profile.instagram)
        .bind(&profile.tiktok)
        .bind(&profile.youtube)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn delete_by_user(&self, user: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user.0)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }
}
