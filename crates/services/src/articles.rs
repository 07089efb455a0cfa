//! Article mutation pipeline.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use domains::models::{Article, ArticleId, ArticlePatch, Comment, LikeState, Page, Principal, Role};
use domains::ports::{ArticleRepository, CategoryRepository, CommentRepository};
use domains::{AppError, Result, ValidationError};

use crate::authorization::{can_mutate, require_role, Ownership};
use crate::ensure_active;
use crate::references::ReferenceResolver;
use crate::validation::{ContentValidator, FieldSpec, Schema, SlugSource, SlugTarget};

const CREATE: Schema = Schema {
    fields: &[
        FieldSpec::text("title").required(),
        FieldSpec::text("description").allow_empty(),
        FieldSpec::blocks("content").required(),
        FieldSpec::list("categories").required(),
    ],
    categories: Some("categories"),
    slug: Some(SlugSource {
        from: "title",
        target: SlugTarget::Article,
    }),
};

const EDIT: Schema = Schema {
    fields: &[
        FieldSpec::text("title"),
        FieldSpec::text("description").allow_empty(),
        FieldSpec::blocks("content"),
        FieldSpec::list("categories"),
    ],
    categories: Some("categories"),
    slug: None,
};

/// An article together with its visible comments, most liked first.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: Article,
    pub comments: Vec<Comment>,
}

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    categories: Arc<dyn CategoryRepository>,
    comments: Arc<dyn CommentRepository>,
    resolver: ReferenceResolver,
    validator: ContentValidator,
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        let resolver = ReferenceResolver::new(articles.clone(), categories.clone());
        Self {
            articles,
            categories,
            comments,
            validator: ContentValidator::new(resolver.clone()),
            resolver,
        }
    }

    pub async fn create(&self, principal: &Principal, payload: &Value) -> Result<Article> {
        ensure_active(principal)?;
        require_role(principal, Role::Author)?;

        let mut clean = self
            .validator
            .validate(&CREATE, payload)
            .await?
            .map_err(AppError::Validation)?;

        let (Some(title), Some(slug)) = (clean.take_text("title"), clean.slug.take()) else {
            return Err(AppError::Infrastructure(anyhow::anyhow!(
                "validated article payload lacks title or slug"
            )));
        };

        let now = Utc::now();
        let article = Article {
            id: ArticleId::new(),
            owner: principal.id,
            title,
            slug,
            description: clean.take_text("description").filter(|d| !d.is_empty()),
            blocks: clean.take_blocks("content").unwrap_or_default(),
            categories: clean.categories.take().unwrap_or_default(),
            likes: Default::default(),
            created_at: now,
            updated_at: now,
        };

        self.articles.insert(article.clone()).await?;
        info!(article_slug = %article.slug, user_id = %principal.id, "article created");
        Ok(article)
    }

    /// Newest first. A named category must exist and not be deleted.
    pub async fn list(&self, page: Page, category_slug: Option<&str>) -> Result<Vec<Article>> {
        let category = match category_slug {
            Some(slug) => {
                let category = self
                    .categories
                    .find_by_slug(slug)
                    .await?
                    .filter(|c| !c.state.is_deleted())
                    .ok_or(AppError::NotFound("category"))?;
                Some(category.id)
            }
            None => None,
        };

        let articles = self.articles.list(page, category).await?;
        if articles.is_empty() {
            return Err(AppError::NotFound("articles"));
        }
        Ok(articles)
    }

    pub async fn get(&self, slug: &str) -> Result<ArticleView> {
        let article = self.resolver.resolve_article_by_slug(slug).await?;
        let comments = self
            .comments
            .list_for_article(article.id)
            .await?
            .into_iter()
            .filter(|c| !c.state.is_deleted())
            .collect();
        Ok(ArticleView { article, comments })
    }

    pub async fn edit(&self, principal: &Principal, slug: &str, payload: &Value) -> Result<Article> {
        ensure_active(principal)?;
        let article = self.resolver.resolve_article_by_slug(slug).await?;
        can_mutate(principal, Ownership::of(article.owner).with_role(Role::Author))?;

        let mut clean = self
            .validator
            .validate(&EDIT, payload)
            .await?
            .map_err(AppError::Validation)?;

        let patch = ArticlePatch {
            title: clean.take_text("title"),
            description: clean.take_text("description"),
            blocks: clean.take_blocks("content"),
            categories: clean.categories.take(),
        };
        if patch.is_empty() {
            return Err(AppError::invalid(ValidationError::NothingToUpdate));
        }

        let updated = self
            .articles
            .apply_patch(article.id, patch, Utc::now())
            .await?
            .ok_or(AppError::NotFound("article"))?;
        info!(article_slug = %updated.slug, user_id = %principal.id, "article edited");
        Ok(updated)
    }

    /// Hard delete. Comments go with the article.
    pub async fn delete(&self, principal: &Principal, slug: &str) -> Result<Article> {
        ensure_active(principal)?;
        let article = self.resolver.resolve_article_by_slug(slug).await?;
        can_mutate(principal, Ownership::of(article.owner).with_role(Role::Author))?;

        if !self.articles.delete_cascade(article.id).await? {
            return Err(AppError::NotFound("article"));
        }
        info!(article_slug = %article.slug, user_id = %principal.id, "article deleted");
        Ok(article)
    }

    pub async fn toggle_like(&self, principal: &Principal, slug: &str) -> Result<LikeState> {
        ensure_active(principal)?;
        let article = self.resolver.resolve_article_by_slug(slug).await?;
        let state = self
            .articles
            .toggle_like(article.id, principal.id)
            .await?
            .ok_or(AppError::NotFound("article"))?;
        debug!(article_slug = %article.slug, liked = state.liked, "article like toggled");
        Ok(state)
    }
}
