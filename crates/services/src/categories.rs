//! Category pipeline. Every mutation is ADMIN-only.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use domains::models::{Category, CategoryId, Lifecycle, Principal, Role};
use domains::ports::{ArticleRepository, CategoryRepository};
use domains::{AppError, Result, ValidationError};

use crate::authorization::require_role;
use crate::ensure_active;
use crate::references::ReferenceResolver;
use crate::validation::{ContentValidator, FieldSpec, Schema, SlugSource, SlugTarget};

const CREATE: Schema = Schema {
    fields: &[
        FieldSpec::text("title").required(),
        FieldSpec::text("description").allow_empty(),
    ],
    categories: None,
    slug: Some(SlugSource {
        from: "title",
        target: SlugTarget::Category,
    }),
};

const EDIT: Schema = Schema {
    fields: &[FieldSpec::text("description").allow_empty()],
    categories: None,
    slug: None,
};

#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
    validator: ContentValidator,
}

impl CategoryService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        let resolver = ReferenceResolver::new(articles, categories.clone());
        Self {
            categories,
            validator: ContentValidator::new(resolver),
        }
    }

    async fn find_live(&self, slug: &str) -> Result<Category> {
        self.categories
            .find_by_slug(slug)
            .await?
            .filter(|c| !c.state.is_deleted())
            .ok_or(AppError::NotFound("category"))
    }

    pub async fn create(&self, principal: &Principal, payload: &Value) -> Result<Category> {
        ensure_active(principal)?;
        require_role(principal, Role::Admin)?;

        let mut clean = self
            .validator
            .validate(&CREATE, payload)
            .await?
            .map_err(AppError::Validation)?;

        let (Some(title), Some(slug)) = (clean.take_text("title"), clean.slug.take()) else {
            return Err(AppError::Infrastructure(anyhow::anyhow!(
                "validated category payload lacks title or slug"
            )));
        };

        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(),
            title,
            slug,
            description: clean.take_text("description").filter(|d| !d.is_empty()),
            state: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        };

        self.categories.insert(category.clone()).await?;
        info!(category_slug = %category.slug, "category created");
        Ok(category)
    }

    /// Live categories sorted by title.
    pub async fn list(&self) -> Result<Vec<Category>> {
        let categories = self.categories.list_active().await?;
        if categories.is_empty() {
            return Err(AppError::NotFound("categories"));
        }
        Ok(categories)
    }

    pub async fn get(&self, slug: &str) -> Result<Category> {
        self.find_live(slug).await
    }

    /// Only the description is editable; title and slug are fixed at creation.
    pub async fn edit(&self, principal: &Principal, slug: &str, payload: &Value) -> Result<Category> {
        ensure_active(principal)?;
        require_role(principal, Role::Admin)?;
        let mut category = self.find_live(slug).await?;

        let mut clean = self
            .validator
            .validate(&EDIT, payload)
            .await?
            .map_err(AppError::Validation)?;
        let Some(description) = clean.take_text("description") else {
            return Err(AppError::invalid(ValidationError::NothingToUpdate));
        };

        category.description = Some(description).filter(|d| !d.is_empty());
        category.updated_at = Utc::now();
        if !self.categories.replace(category.clone()).await? {
            return Err(AppError::NotFound("category"));
        }
        info!(category_slug = %category.slug, "category edited");
        Ok(category)
    }

    /// Soft delete. Articles keep their stale reference, new ones can't use it.
    pub async fn delete(&self, principal: &Principal, slug: &str) -> Result<Category> {
        ensure_active(principal)?;
        require_role(principal, Role::Admin)?;
        let mut category = self.find_live(slug).await?;

        category.soft_delete(Utc::now());
        if !self.categories.replace(category.clone()).await? {
            return Err(AppError::NotFound("category"));
        }
        info!(category_id = %category.id, former_slug = slug, "category soft-deleted");
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::models::{BanState, UserId};
    use domains::ports::{MockArticleRepository, MockCategoryRepository};
    use domains::Denial;
    use serde_json::json;

    fn principal(roles: &[Role]) -> Principal {
        Principal {
            id: UserId::new(),
            roles: roles.iter().copied().collect(),
            ban: BanState::default(),
        }
    }

    fn live(slug: &str) -> Category {
        let now = Utc::now();
        Category {
            id: CategoryId::new(),
            title: slug.to_uppercase(),
            slug: slug.to_string(),
            description: None,
            state: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(categories: MockCategoryRepository) -> CategoryService {
        CategoryService::new(Arc::new(MockArticleRepository::new()), Arc::new(categories))
    }

    #[tokio::test]
    async fn only_admin_creates() {
        let result = service(MockCategoryRepository::new())
            .create(&principal(&[Role::Author]), &json!({ "title": "Rust" }))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(Denial::MissingRole(Role::Admin)))
        ));
    }

    #[tokio::test]
    async fn duplicate_title_is_already_taken() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_exists_with_slug_or_title()
            .withf(|slug, title| slug == "rust" && title == "Rust")
            .returning(|_, _| Ok(true));
        repo.expect_insert().never();

        let result = service(repo)
            .create(&principal(&[Role::Admin]), &json!({ "title": "Rust" }))
            .await;
        match result {
            Err(AppError::Validation(errors)) => assert_eq!(
                errors,
                vec![ValidationError::AlreadyTaken {
                    field: "title".into()
                }]
            ),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_overwrites_with_placeholders() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_find_by_slug()
            .returning(|slug| Ok(Some(live(slug))));
        repo.expect_replace()
            .withf(|c| c.state.is_deleted() && c.slug.starts_with("deleted-"))
            .times(1)
            .returning(|_| Ok(true));

        let deleted = service(repo)
            .delete(&principal(&[Role::Admin]), "rust")
            .await
            .unwrap();
        assert_eq!(
            deleted.description.as_deref(),
            Some(Category::DELETED_DESCRIPTION)
        );
    }

    #[tokio::test]
    async fn deleted_category_is_not_found() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_find_by_slug().returning(|slug| {
            let mut category = live(slug);
            category.soft_delete(Utc::now());
            Ok(Some(category))
        });

        let result = service(repo).get("rust").await;
        assert!(matches!(result, Err(AppError::NotFound("category"))));
    }

    #[tokio::test]
    async fn edit_of_category_deleted_meanwhile_is_not_found() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_find_by_slug()
            .returning(|slug| Ok(Some(live(slug))));
        repo.expect_replace().times(1).returning(|_| Ok(false));

        let result = service(repo)
            .edit(&principal(&[Role::Admin]), "rust", &json!({ "description": "late" }))
            .await;
        assert!(matches!(result, Err(AppError::NotFound("category"))));
    }

    #[tokio::test]
    async fn edit_without_description_is_nothing_to_update() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_find_by_slug()
            .returning(|slug| Ok(Some(live(slug))));
        repo.expect_replace().never();

        let result = service(repo)
            .edit(&principal(&[Role::Admin]), "rust", &json!({ "title": "ignored" }))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
