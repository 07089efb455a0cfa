//! Read-only lookups that confirm cross-entity references before a write.

use std::sync::Arc;

use domains::models::{Article, CategoryId};
use domains::ports::{ArticleRepository, CategoryRepository};
use domains::{AppError, Result, ValidationError};

#[derive(Clone)]
pub struct ReferenceResolver {
    articles: Arc<dyn ArticleRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl ReferenceResolver {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            articles,
            categories,
        }
    }

    /// Confirms every requested id names a live category.
    ///
    /// Duplicates are collapsed first. Unparseable, unknown and soft-deleted
    /// ids all produce the same single `UnknownCategories` error.
    /// The outer `Result` only fails on store errors.
    pub async fn resolve_categories(
        &self,
        raw_ids: &[String],
    ) -> Result<std::result::Result<Vec<CategoryId>, ValidationError>> {
        let mut requested: Vec<String> = Vec::with_capacity(raw_ids.len());
        for id in raw_ids {
            if !requested.contains(id) {
                requested.push(id.clone());
            }
        }

        let parsed: Vec<CategoryId> = requested
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect();
        if parsed.len() != requested.len() {
            return Ok(Err(ValidationError::UnknownCategories));
        }
        if parsed.is_empty() {
            return Ok(Ok(parsed));
        }

        let found = self.categories.find_active_by_ids(parsed.clone()).await?;
        if found.len() != parsed.len() {
            tracing::debug!(
                requested = parsed.len(),
                found = found.len(),
                "category reference resolution failed"
            );
            return Ok(Err(ValidationError::UnknownCategories));
        }
        Ok(Ok(parsed))
    }

    pub async fn resolve_article_by_slug(&self, slug: &str) -> Result<Article> {
        self.articles
            .find_by_slug(slug)
            .await?
            .ok_or(AppError::NotFound("article"))
    }

    pub async fn article_slug_taken(&self, slug: &str) -> Result<bool> {
        Ok(self.articles.slug_exists(slug).await?)
    }

    pub async fn category_taken(&self, slug: &str, title: &str) -> Result<bool> {
        Ok(self
            .categories
            .exists_with_slug_or_title(slug, title)
            .await?)
    }
}
