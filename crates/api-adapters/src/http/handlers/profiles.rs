use axum::extract::{Path, State};

use domains::models::Profile;
use services::ProfileView;

use crate::http::{ApiError, ApiSuccess, AppState, AuthUser, JsonBody};

const ENTITY: &str = "profile";

pub async fn me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<ApiSuccess<ProfileView>, ApiError> {
    let result = state.services.profiles.me(&principal).await;
    Ok(ApiSuccess::ok("Profile found", state.track(ENTITY, "read", result)?))
}

pub async fn of_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiSuccess<ProfileView>, ApiError> {
    let result = state.services.profiles.of_user(&id).await;
    Ok(ApiSuccess::ok("Profile found", state.track(ENTITY, "read", result)?))
}

pub async fn edit_mine(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Profile>, ApiError> {
    let result = state.services.profiles.edit(&principal, None, &payload).await;
    Ok(ApiSuccess::ok("Profile updated", state.track(ENTITY, "edit", result)?))
}

pub async fn edit_other(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Profile>, ApiError> {
    let result = state.services.profiles.edit(&principal, Some(&id), &payload).await;
    Ok(ApiSuccess::ok("Profile updated", state.track(ENTITY, "edit", result)?))
}
