use axum::extract::{Path, State};

use domains::models::{Comment, LikeState};

use crate::http::{ApiError, ApiSuccess, AppState, AuthUser, JsonBody};

const ENTITY: &str = "comment";

pub async fn create(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Comment>, ApiError> {
    let result = state.services.comments.create(&principal, &payload).await;
    Ok(ApiSuccess::created("Comment created", state.track(ENTITY, "create", result)?))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiSuccess<Comment>, ApiError> {
    let result = state.services.comments.get(&id).await;
    Ok(ApiSuccess::ok("Comment found", state.track(ENTITY, "read", result)?))
}

pub async fn edit(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Comment>, ApiError> {
    let result = state.services.comments.edit(&principal, &id, &payload).await;
    Ok(ApiSuccess::ok("Comment updated", state.track(ENTITY, "edit", result)?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiSuccess<Comment>, ApiError> {
    let result = state.services.comments.delete(&principal, &id).await;
    Ok(ApiSuccess::ok("Comment deleted", state.track(ENTITY, "delete", result)?))
}

pub async fn like(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiSuccess<LikeState>, ApiError> {
    let result = state.services.comments.toggle_like(&principal, &id).await;
    Ok(ApiSuccess::ok("Like toggled", state.track(ENTITY, "like", result)?))
}
