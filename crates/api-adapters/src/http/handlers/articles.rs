use axum::extract::{Path, Query, State};
use serde::Deserialize;

use domains::models::{Article, LikeState, Page};
use services::ArticleView;

use crate::http::{ApiError, ApiSuccess, AppState, AuthUser, JsonBody};

const ENTITY: &str = "article";

/// Unparseable numbers fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<String>,
    size: Option<String>,
    category: Option<String>,
}

impl ListParams {
    fn page(&self) -> Page {
        Page::new(
            self.page.as_deref().and_then(|v| v.parse().ok()),
            self.size.as_deref().and_then(|v| v.parse().ok()),
        )
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<ApiSuccess<Vec<Article>>, ApiError> {
    let result = state
        .services
        .articles
        .list(params.page(), params.category.as_deref())
        .await;
    let articles = state.track(ENTITY, "list", result)?;
    Ok(ApiSuccess::ok("Articles found", articles))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Article>, ApiError> {
    let result = state.services.articles.create(&principal, &payload).await;
    let article = state.track(ENTITY, "create", result)?;
    Ok(ApiSuccess::created("Article created", article))
}

pub async fn read(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ApiSuccess<ArticleView>, ApiError> {
    let result = state.services.articles.get(&slug).await;
    Ok(ApiSuccess::ok("Article found", state.track(ENTITY, "read", result)?))
}

pub async fn edit(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(slug): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Article>, ApiError> {
    let result = state.services.articles.edit(&principal, &slug, &payload).await;
    Ok(ApiSuccess::ok("Article updated", state.track(ENTITY, "edit", result)?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(slug): Path<String>,
) -> Result<ApiSuccess<Article>, ApiError> {
    let result = state.services.articles.delete(&principal, &slug).await;
    let article = state.track(ENTITY, "delete", result)?;
    Ok(ApiSuccess::ok("Article deleted", article))
}

pub async fn like(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(slug): Path<String>,
) -> Result<ApiSuccess<LikeState>, ApiError> {
    let result = state.services.articles.toggle_like(&principal, &slug).await;
    Ok(ApiSuccess::ok("Like toggled", state.track(ENTITY, "like", result)?))
}
