//! Comment pipeline. Authors and ADMIN may mutate; deletion is soft.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use domains::models::{Comment, CommentId, Lifecycle, LikeState, Principal};
use domains::ports::{ArticleRepository, CategoryRepository, CommentRepository};
use domains::{AppError, Result, ValidationError};

use crate::authorization::{can_mutate, Ownership};
use crate::ensure_active;
use crate::references::ReferenceResolver;
use crate::validation::{check_fields, FieldSpec};

const CREATE: &[FieldSpec] = &[
    FieldSpec::text("article").required(),
    FieldSpec::text("text").required(),
];

const EDIT: &[FieldSpec] = &[FieldSpec::text("text").required()];

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    resolver: ReferenceResolver,
}

impl CommentService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        Self {
            comments,
            resolver: ReferenceResolver::new(articles, categories),
        }
    }

    /// Unparseable ids, unknown ids and soft-deleted comments all read as absent.
    async fn find_live(&self, id: &str) -> Result<Comment> {
        let id: CommentId = id.parse().map_err(|_| AppError::NotFound("comment"))?;
        self.comments
            .find_by_id(id)
            .await?
            .filter(|c| !c.state.is_deleted())
            .ok_or(AppError::NotFound("comment"))
    }

    /// Stores a revision made on top of the copy read at `prior`.
    /// A comment deleted in the meantime reads as absent; any other
    /// intervening write is a conflict.
    async fn commit(&self, comment: &Comment, prior: DateTime<Utc>) -> Result<()> {
        if self.comments.save_revision(comment.clone(), prior).await? {
            return Ok(());
        }
        self.find_live(&comment.id.to_string()).await?;
        debug!(comment_id = %comment.id, "comment revision lost a race");
        Err(AppError::Rejected("comment was modified concurrently".to_string()))
    }

    pub async fn create(&self, principal: &Principal, payload: &Value) -> Result<Comment> {
        ensure_active(principal)?;
        let mut clean = check_fields(CREATE, payload).map_err(AppError::Validation)?;
        let (Some(slug), Some(text)) = (clean.take_text("article"), clean.take_text("text")) else {
            return Err(AppError::Infrastructure(anyhow::anyhow!(
                "validated comment payload lacks article or text"
            )));
        };
        let article = self.resolver.resolve_article_by_slug(&slug).await?;

        let now = Utc::now();
        let comment = Comment {
            id: CommentId::new(),
            article: article.id,
            author: principal.id,
            text,
            revisions: Vec::new(),
            state: Lifecycle::Active,
            likes: Default::default(),
            created_at: now,
            updated_at: now,
        };

        self.comments.insert(comment.clone()).await?;
        info!(comment_id = %comment.id, article_slug = %slug, "comment created");
        Ok(comment)
    }

    pub async fn get(&self, id: &str) -> Result<Comment> {
        self.find_live(id).await
    }

    pub async fn edit(&self, principal: &Principal, id: &str, payload: &Value) -> Result<Comment> {
        ensure_active(principal)?;
        let mut comment = self.find_live(id).await?;
        can_mutate(principal, Ownership::of(comment.author))?;

        let mut clean = check_fields(EDIT, payload).map_err(AppError::Validation)?;
        let text = clean.take_text("text").unwrap_or_default();
        if text == comment.text {
            return Err(AppError::invalid(ValidationError::TextUnchanged));
        }

        let prior = comment.updated_at;
        comment.revise(text, Utc::now());
        self.commit(&comment, prior).await?;
        info!(comment_id = %comment.id, revisions = comment.revisions.len(), "comment edited");
        Ok(comment)
    }

    /// Replaces the text with a placeholder; history is kept.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<Comment> {
        ensure_active(principal)?;
        let mut comment = self.find_live(id).await?;
        can_mutate(principal, Ownership::of(comment.author))?;

        let prior = comment.updated_at;
        comment.soft_delete(Utc::now());
        self.commit(&comment, prior).await?;
        info!(comment_id = %comment.id, "comment soft-deleted");
        Ok(comment)
    }

    pub async fn toggle_like(&self, principal: &Principal, id: &str) -> Result<LikeState> {
        ensure_active(principal)?;
        let comment = self.find_live(id).await?;
        let state = self
            .comments
            .toggle_like(comment.id, principal.id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;
        debug!(comment_id = %comment.id, liked = state.liked, "comment like toggled");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::models::{ArticleId, BanState, Role, UserId};
    use domains::ports::{MockArticleRepository, MockCategoryRepository, MockCommentRepository};
    use domains::Denial;
    use serde_json::json;

    fn principal(roles: &[Role]) -> Principal {
        Principal {
            id: UserId::new(),
            roles: roles.iter().copied().collect(),
            ban: BanState::default(),
        }
    }

    fn comment(author: UserId, text: &str) -> Comment {
        let now = Utc::now();
        Comment {
            id: CommentId::new(),
            article: ArticleId::new(),
            author,
            text: text.to_string(),
            revisions: vec![],
            state: Lifecycle::Active,
            likes: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(comments: MockCommentRepository) -> CommentService {
        CommentService::new(
            Arc::new(MockArticleRepository::new()),
            Arc::new(MockCategoryRepository::new()),
            Arc::new(comments),
        )
    }

    #[tokio::test]
    async fn identical_text_is_rejected() {
        let author = principal(&[Role::User]);
        let existing = comment(author.id, "same");
        let id = existing.id.to_string();
        let mut repo = MockCommentRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_save_revision().never();

        let result = service(repo).edit(&author, &id, &json!({ "text": "same" })).await;
        match result {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::TextUnchanged])
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn edit_appends_revision() {
        let author = principal(&[Role::User]);
        let existing = comment(author.id, "before");
        let id = existing.id.to_string();
        let prior = existing.updated_at;
        let mut repo = MockCommentRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_save_revision()
            .withf(move |c, at| c.text == "after" && c.revisions.len() == 1 && *at == prior)
            .returning(|_, _| Ok(true));

        let edited = service(repo)
            .edit(&author, &id, &json!({ "text": "after" }))
            .await
            .unwrap();
        assert_eq!(edited.revisions[0].text, "before");
    }

    #[tokio::test]
    async fn stranger_cannot_delete() {
        let existing = comment(UserId::new(), "mine");
        let id = existing.id.to_string();
        let mut repo = MockCommentRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));

        let result = service(repo).delete(&principal(&[Role::Author]), &id).await;
        assert!(matches!(result, Err(AppError::Forbidden(Denial::NotOwner))));
    }

    #[tokio::test]
    async fn admin_deletes_with_placeholder() {
        let existing = comment(UserId::new(), "rude");
        let id = existing.id.to_string();
        let mut repo = MockCommentRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_save_revision().returning(|_, _| Ok(true));

        let deleted = service(repo)
            .delete(&principal(&[Role::Admin]), &id)
            .await
            .unwrap();
        assert_eq!(deleted.text, Comment::DELETED_TEXT);
        assert_eq!(deleted.revisions[0].text, "rude");
    }

    #[tokio::test]
    async fn edit_racing_a_delete_is_not_found() {
        let author = principal(&[Role::User]);
        let existing = comment(author.id, "one");
        let id = existing.id.to_string();
        let mut deleted = existing.clone();
        deleted.soft_delete(Utc::now());

        let mut repo = MockCommentRepository::new();
        let mut reads = 0;
        repo.expect_find_by_id().times(2).returning(move |_| {
            reads += 1;
            if reads == 1 {
                Ok(Some(existing.clone()))
            } else {
                Ok(Some(deleted.clone()))
            }
        });
        repo.expect_save_revision().times(1).returning(|_, _| Ok(false));

        let result = service(repo).edit(&author, &id, &json!({ "text": "two" })).await;
        assert!(matches!(result, Err(AppError::NotFound("comment"))));
    }

    #[tokio::test]
    async fn edit_racing_another_edit_is_rejected() {
        let author = principal(&[Role::User]);
        let existing = comment(author.id, "one");
        let id = existing.id.to_string();
        let mut repo = MockCommentRepository::new();
        repo.expect_find_by_id()
            .times(2)
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_save_revision().returning(|_, _| Ok(false));

        let result = service(repo).edit(&author, &id, &json!({ "text": "two" })).await;
        assert!(matches!(result, Err(AppError::Rejected(_))));
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let result = service(MockCommentRepository::new()).get("42").await;
        assert!(matches!(result, Err(AppError::NotFound("comment"))));
    }

    #[tokio::test]
    async fn comment_on_missing_article_is_not_found() {
        let mut articles = MockArticleRepository::new();
        articles.expect_find_by_slug().returning(|_| Ok(None));
        let svc = CommentService::new(
            Arc::new(articles),
            Arc::new(MockCategoryRepository::new()),
            Arc::new(MockCommentRepository::new()),
        );

        let result = svc
            .create(&principal(&[Role::User]), &json!({ "article": "ghost", "text": "hi" }))
            .await;
        assert!(matches!(result, Err(AppError::NotFound("article"))));
    }
}
