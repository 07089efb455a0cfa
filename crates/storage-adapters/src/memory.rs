//! # In-memory document store
//!
//! Every collection is a `DashMap`. Unique keys (e-mail, article slug,
//! category slug and title) live in separate reservation maps that are
//! claimed through the entry API, so two racing inserts cannot both win.
//! Single-document updates such as like toggles run under the shard
//! write lock returned by `get_mut`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use domains::models::{
    Article, ArticleId, ArticlePatch, BanState, Category, CategoryId, Comment, CommentId,
    LikeState, Page, Profile, User, UserId,
};
use domains::ports::{
    ArticleRepository, CategoryRepository, CommentRepository, ProfileRepository, UserRepository,
};
use domains::StoreError;

use std::collections::BTreeSet;
use std::hash::Hash;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<UserId, User>,
    emails: DashMap<String, UserId>,
    articles: DashMap<ArticleId, Article>,
    article_slugs: DashMap<String, ArticleId>,
    categories: DashMap<CategoryId, Category>,
    category_slugs: DashMap<String, CategoryId>,
    category_titles: DashMap<String, CategoryId>,
    comments: DashMap<CommentId, Comment>,
    profiles: DashMap<UserId, Profile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Claims `key` for `owner`. Re-claiming a key the owner already holds succeeds.
fn reserve<K, V>(map: &DashMap<K, V>, key: K, owner: V, field: &str) -> Result<(), StoreError>
where
    K: Eq + Hash,
    V: PartialEq + Copy,
{
    match map.entry(key) {
        Entry::Occupied(held) if *held.get() == owner => Ok(()),
        Entry::Occupied(_) => Err(StoreError::UniqueViolation(field.to_string())),
        Entry::Vacant(slot) => {
            slot.insert(owner);
            Ok(())
        }
    }
}

fn release<K, V>(map: &DashMap<K, V>, key: &K, owner: V)
where
    K: Eq + Hash,
    V: PartialEq,
{
    map.remove_if(key, |_, held| *held == owner);
}

fn toggle(likes: &mut BTreeSet<UserId>, user: UserId) -> LikeState {
    let liked = if likes.remove(&user) {
        false
    } else {
        likes.insert(user);
        true
    };
    LikeState {
        liked,
        likes: likes.len(),
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_verification_key(&self, key: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.verification.as_ref().is_some_and(|v| v.key == key))
            .map(|u| u.clone()))
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        reserve(&self.emails, user.email.clone(), user.id, "email")?;
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn replace(&self, user: User) -> Result<(), StoreError> {
        let Some(previous) = self.users.get(&user.id).map(|u| u.email.clone()) else {
            return Ok(());
        };
        if previous != user.email {
            reserve(&self.emails, user.email.clone(), user.id, "email")?;
            release(&self.emails, &previous, user.id);
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        release(&self.emails, &user.email, id);
        Ok(true)
    }

    async fn record_ban(
        &self,
        id: UserId,
        minutes: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<BanState>, StoreError> {
        Ok(self.users.get_mut(&id).map(|mut user| {
            user.ban = user.ban.escalated(minutes, at);
            user.updated_at = at;
            user.ban.clone()
        }))
    }
}

#[async_trait]
impl ArticleRepository for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        let Some(id) = self.article_slugs.get(slug).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.articles.get(&id).map(|a| a.clone()))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        Ok(self.article_slugs.contains_key(slug))
    }

    async fn list(
        &self,
        page: Page,
        category: Option<CategoryId>,
    ) -> Result<Vec<Article>, StoreError> {
        let mut matching: Vec<Article> = self
            .articles
            .iter()
            .filter(|a| category.map_or(true, |c| a.categories.contains(&c)))
            .map(|a| a.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(page.size as usize)
            .collect())
    }

    async fn insert(&self, article: Article) -> Result<(), StoreError> {
        reserve(&self.article_slugs, article.slug.clone(), article.id, "slug")?;
        self.articles.insert(article.id, article);
        Ok(())
    }

    async fn apply_patch(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
        at: DateTime<Utc>,
    ) -> Result<Option<Article>, StoreError> {
        Ok(self.articles.get_mut(&id).map(|mut article| {
            patch.apply(&mut article, at);
            article.clone()
        }))
    }

    async fn delete_cascade(&self, id: ArticleId) -> Result<bool, StoreError> {
        let Some((_, article)) = self.articles.remove(&id) else {
            return Ok(false);
        };
        release(&self.article_slugs, &article.slug, id);
        let before = self.comments.len();
        self.comments.retain(|_, c| c.article != id);
        debug!(
            article_id = %id,
            comments_removed = before.saturating_sub(self.comments.len()),
            "article cascade delete"
        );
        Ok(true)
    }

    async fn toggle_like(
        &self,
        id: ArticleId,
        user: UserId,
    ) -> Result<Option<LikeState>, StoreError> {
        Ok(self
            .articles
            .get_mut(&id)
            .map(|mut article| toggle(&mut article.likes, user)))
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let Some(id) = self.category_slugs.get(slug).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.categories.get(&id).map(|c| c.clone()))
    }

    async fn find_active_by_ids(&self, ids: Vec<CategoryId>) -> Result<Vec<Category>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.categories.get(id).map(|c| c.clone()))
            .filter(|c| !c.state.is_deleted())
            .collect())
    }

    async fn exists_with_slug_or_title(
        &self,
        slug: &str,
        title: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.category_slugs.contains_key(slug) || self.category_titles.contains_key(title))
    }

    async fn list_active(&self) -> Result<Vec<Category>, StoreError> {
        let mut live: Vec<Category> = self
            .categories
            .iter()
            .filter(|c| !c.state.is_deleted())
            .map(|c| c.clone())
            .collect();
        live.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(live)
    }

    async fn insert(&self, category: Category) -> Result<(), StoreError> {
        reserve(&self.category_slugs, category.slug.clone(), category.id, "slug")?;
        if let Err(err) = reserve(&self.category_titles, category.title.clone(), category.id, "title") {
            release(&self.category_slugs, &category.slug, category.id);
            return Err(err);
        }
        self.categories.insert(category.id, category);
        Ok(())
    }

    async fn replace(&self, category: Category) -> Result<bool, StoreError> {
        let id = category.id;
        // Guard held until the write: liveness check and replace are one step.
        let Some(mut stored) = self.categories.get_mut(&id) else {
            return Ok(false);
        };
        if stored.state.is_deleted() {
            debug!(category_id = %id, "stale write to deleted category refused");
            return Ok(false);
        }
        let (old_slug, old_title) = (stored.slug.clone(), stored.title.clone());

        reserve(&self.category_slugs, category.slug.clone(), id, "slug")?;
        if let Err(err) = reserve(&self.category_titles, category.title.clone(), id, "title") {
            if old_slug != category.slug {
                release(&self.category_slugs, &category.slug, id);
            }
            return Err(err);
        }
        if old_slug != category.slug {
            release(&self.category_slugs, &old_slug, id);
        }
        if old_title != category.title {
            release(&self.category_titles, &old_title, id);
        }
        *stored = category;
        Ok(true)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        Ok(self.comments.get(&id).map(|c| c.clone()))
    }

    async fn list_for_article(&self, article: ArticleId) -> Result<Vec<Comment>, StoreError> {
        let mut thread: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.article == article)
            .map(|c| c.clone())
            .collect();
        thread.sort_by(|a, b| {
            b.likes
                .len()
                .cmp(&a.likes.len())
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(thread)
    }

    async fn insert(&self, comment: Comment) -> Result<(), StoreError> {
        self.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn save_revision(
        &self,
        comment: Comment,
        prior: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(mut stored) = self.comments.get_mut(&comment.id) else {
            return Ok(false);
        };
        if stored.state.is_deleted() || stored.updated_at != prior {
            debug!(comment_id = %comment.id, "stale comment revision refused");
            return Ok(false);
        }
        stored.text = comment.text;
        stored.revisions = comment.revisions;
        stored.state = comment.state;
        stored.updated_at = comment.updated_at;
        Ok(true)
    }

    async fn toggle_like(
        &self,
        id: CommentId,
        user: UserId,
    ) -> Result<Option<LikeState>, StoreError> {
        Ok(self
            .comments
            .get_mut(&id)
            .map(|mut comment| toggle(&mut comment.likes, user)))
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_by_user(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.get(&user).map(|p| p.clone()))
    }

    async fn insert(&self, profile: Profile) -> Result<(), StoreError> {
        match self.profiles.entry(profile.user) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation("user".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(profile);
                Ok(())
            }
        }
    }

    async fn replace(&self, profile: Profile) -> Result<(), StoreError> {
        if let Some(mut stored) = self.profiles.get_mut(&profile.user) {
            *stored = profile;
        }
        Ok(())
    }

    async fn delete_by_user(&self, user: UserId) -> Result<bool, StoreError> {
        Ok(self.profiles.remove(&user).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::models::{Block, Lifecycle};
    use std::sync::Arc;

    fn article(slug: &str, category: Option<CategoryId>) -> Article {
        let now = Utc::now();
        Article {
            id: ArticleId::new(),
            owner: UserId::new(),
            title: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            blocks: vec![Block {
                kind: "p".into(),
                content: "x".into(),
            }],
            categories: category.into_iter().collect(),
            likes: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn comment(article: ArticleId) -> Comment {
        let now = Utc::now();
        Comment {
            id: CommentId::new(),
            article,
            author: UserId::new(),
            text: "hi".into(),
            revisions: vec![],
            state: Lifecycle::Active,
            likes: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn category(title: &str) -> Category {
        let now = Utc::now();
        Category {
            id: CategoryId::new(),
            title: title.to_string(),
            slug: title.to_lowercase(),
            description: None,
            state: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let store = MemoryStore::new();
        ArticleRepository::insert(&store, article("same", None)).await.unwrap();
        let err = ArticleRepository::insert(&store, article("same", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(field) if field == "slug"));
    }

    #[tokio::test]
    async fn concurrent_likes_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let target = article("liked", None);
        let id = target.id;
        ArticleRepository::insert(store.as_ref(), target).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                ArticleRepository::toggle_like(store.as_ref(), id, UserId::new()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = ArticleRepository::find_by_slug(store.as_ref(), "liked")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.likes.len(), 32);
    }

    #[tokio::test]
    async fn toggling_twice_restores_state() {
        let store = MemoryStore::new();
        let target = article("toggle", None);
        let id = target.id;
        ArticleRepository::insert(&store, target).await.unwrap();
        let user = UserId::new();

        let first = ArticleRepository::toggle_like(&store, id, user).await.unwrap().unwrap();
        let second = ArticleRepository::toggle_like(&store, id, user).await.unwrap().unwrap();
        assert_eq!(first, LikeState { liked: true, likes: 1 });
        assert_eq!(second, LikeState { liked: false, likes: 0 });
    }

    #[tokio::test]
    async fn cascade_delete_removes_comments_and_frees_slug() {
        let store = MemoryStore::new();
        let parent = article("parent", None);
        let id = parent.id;
        ArticleRepository::insert(&store, parent).await.unwrap();
        CommentRepository::insert(&store, comment(id)).await.unwrap();
        let unrelated = comment(ArticleId::new());
        let unrelated_id = unrelated.id;
        CommentRepository::insert(&store, unrelated).await.unwrap();

        assert!(store.delete_cascade(id).await.unwrap());
        assert!(store.list_for_article(id).await.unwrap().is_empty());
        assert!(CommentRepository::find_by_id(&store, unrelated_id)
            .await
            .unwrap()
            .is_some());
        assert!(!store.slug_exists("parent").await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_category_newest_first() {
        let store = MemoryStore::new();
        let rust = CategoryId::new();
        let mut older = article("older", Some(rust));
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        ArticleRepository::insert(&store, older).await.unwrap();
        ArticleRepository::insert(&store, article("newer", Some(rust))).await.unwrap();
        ArticleRepository::insert(&store, article("other", None)).await.unwrap();

        let listed = ArticleRepository::list(&store, Page::default(), Some(rust))
            .await
            .unwrap();
        let slugs: Vec<_> = listed.iter().map(|a| a.slug.as_str()).collect();
        assert_eq!(slugs, ["newer", "older"]);
    }

    #[tokio::test]
    async fn soft_deleted_category_is_hidden_and_frees_slug() {
        let store = MemoryStore::new();
        let rust = category("Rust");
        let id = rust.id;
        CategoryRepository::insert(&store, rust.clone()).await.unwrap();

        let mut deleted = rust;
        deleted.soft_delete(Utc::now());
        assert!(CategoryRepository::replace(&store, deleted).await.unwrap());

        assert!(store.find_active_by_ids(vec![id]).await.unwrap().is_empty());
        assert!(!store.exists_with_slug_or_title("rust", "Rust").await.unwrap());
        CategoryRepository::insert(&store, category("Rust")).await.unwrap();
    }

    #[tokio::test]
    async fn save_revision_keeps_likes() {
        let store = MemoryStore::new();
        let original = comment(ArticleId::new());
        let id = original.id;
        CommentRepository::insert(&store, original.clone()).await.unwrap();
        CommentRepository::toggle_like(&store, id, UserId::new()).await.unwrap();

        let prior = original.updated_at;
        let mut edited = original;
        edited.revise("edited".into(), Utc::now());
        assert!(store.save_revision(edited, prior).await.unwrap());

        let stored = CommentRepository::find_by_id(&store, id).await.unwrap().unwrap();
        assert_eq!(stored.text, "edited");
        assert_eq!(stored.likes.len(), 1);
    }

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            name: "a".into(),
            email: email.into(),
            password_hash: String::new(),
            roles: BTreeSet::new(),
            ban: Default::default(),
            email_verified: false,
            verification: None,
            anonymized: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn stale_category_copy_cannot_undo_delete() {
        let store = MemoryStore::new();
        let rust = category("Rust");
        CategoryRepository::insert(&store, rust.clone()).await.unwrap();

        let mut stale = rust.clone();
        let mut deleted = rust;
        deleted.soft_delete(Utc::now());
        assert!(CategoryRepository::replace(&store, deleted).await.unwrap());

        stale.description = Some("edited meanwhile".into());
        assert!(!CategoryRepository::replace(&store, stale).await.unwrap());

        assert!(store.list_active().await.unwrap().is_empty());
        assert!(CategoryRepository::find_by_slug(&store, "rust")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn stale_revision_after_delete_is_refused() {
        let store = MemoryStore::new();
        let original = comment(ArticleId::new());
        let id = original.id;
        let prior = original.updated_at;
        CommentRepository::insert(&store, original.clone()).await.unwrap();

        let mut deleted = original.clone();
        deleted.soft_delete(prior + chrono::Duration::seconds(1));
        assert!(store.save_revision(deleted, prior).await.unwrap());

        let mut stale = original;
        stale.revise("two".into(), prior + chrono::Duration::seconds(2));
        assert!(!store.save_revision(stale, prior).await.unwrap());

        let stored = CommentRepository::find_by_id(&store, id).await.unwrap().unwrap();
        assert!(stored.state.is_deleted());
        assert_eq!(stored.text, Comment::DELETED_TEXT);
        assert_eq!(stored.revisions.len(), 1);
    }

    #[tokio::test]
    async fn second_edit_from_same_read_is_refused() {
        let store = MemoryStore::new();
        let original = comment(ArticleId::new());
        let prior = original.updated_at;
        CommentRepository::insert(&store, original.clone()).await.unwrap();

        let mut first = original.clone();
        first.revise("first".into(), prior + chrono::Duration::seconds(1));
        let mut second = original;
        second.revise("second".into(), prior + chrono::Duration::seconds(2));

        assert!(store.save_revision(first, prior).await.unwrap());
        assert!(!store.save_revision(second, prior).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_bans_all_count() {
        let store = Arc::new(MemoryStore::new());
        let target = user("troll@example.com");
        let id = target.id;
        UserRepository::insert(store.as_ref(), target).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_ban(id, 10, Utc::now()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap().unwrap();
        }

        let stored = UserRepository::find_by_id(store.as_ref(), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.ban.ban_count, 3);
        assert_eq!(stored.ban.banned_until, Some(BanState::permanent_expiry()));
    }

    #[tokio::test]
    async fn ban_of_unknown_user_is_none() {
        let store = MemoryStore::new();
        assert!(store
            .record_ban(UserId::new(), 5, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleting_user_frees_email() {
        let store = MemoryStore::new();
        let first = user("a@example.com");
        let id = first.id;
        UserRepository::insert(&store, first).await.unwrap();

        assert!(UserRepository::delete(&store, id).await.unwrap());
        assert!(store.find_by_email("a@example.com").await.unwrap().is_none());
        UserRepository::insert(&store, user("a@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn email_is_unique() {
        let store = MemoryStore::new();
        let user = user("a@example.com");
        let mut twin = user.clone();
        twin.id = UserId::new();

        UserRepository::insert(&store, user).await.unwrap();
        let err = UserRepository::insert(&store, twin).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(field) if field == "email"));
    }
}
