use axum::extract::{Path, State};

use domains::models::Category;

use crate::http::{ApiError, ApiSuccess, AppState, AuthUser, JsonBody};

const ENTITY: &str = "category";

pub async fn list(State(state): State<AppState>) -> Result<ApiSuccess<Vec<Category>>, ApiError> {
    let result = state.services.categories.list().await;
    Ok(ApiSuccess::ok("Categories found", state.track(ENTITY, "list", result)?))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Category>, ApiError> {
    let result = state.services.categories.create(&principal, &payload).await;
    let category = state.track(ENTITY, "create", result)?;
    Ok(ApiSuccess::created("Category created", category))
}

pub async fn read(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ApiSuccess<Category>, ApiError> {
    let result = state.services.categories.get(&slug).await;
    Ok(ApiSuccess::ok("Category found", state.track(ENTITY, "read", result)?))
}

pub async fn edit(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(slug): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Category>, ApiError> {
    let result = state.services.categories.edit(&principal, &slug, &payload).await;
    Ok(ApiSuccess::ok("Category updated", state.track(ENTITY, "edit", result)?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(slug): Path<String>,
) -> Result<ApiSuccess<Category>, ApiError> {
    let result = state.services.categories.delete(&principal, &slug).await;
    let category = state.track(ENTITY, "delete", result)?;
    Ok(ApiSuccess::ok("Category deleted", category))
}
