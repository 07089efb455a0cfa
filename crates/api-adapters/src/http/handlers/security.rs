use axum::extract::{Path, State};
use serde::Serialize;

use services::Registered;

use crate::http::{ApiError, ApiSuccess, AppState, AuthUser, JsonBody};

const ENTITY: &str = "security";

#[derive(Debug, Serialize)]
pub struct TokenBody {
    token: String,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<Registered>, ApiError> {
    let result = state.services.security.register(&payload).await;
    let user = state.track(ENTITY, "register", result)?;
    Ok(ApiSuccess::created("User registered, check your mailbox", user))
}

pub async fn authenticate(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<TokenBody>, ApiError> {
    let result = state.services.security.authenticate(&payload).await;
    let token = state.track(ENTITY, "authenticate", result)?;
    Ok(ApiSuccess::ok("Authenticated", TokenBody { token }))
}

pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<ApiSuccess<()>, ApiError> {
    let result = state.services.security.delete_me(&principal).await;
    state.track(ENTITY, "delete", result)?;
    Ok(ApiSuccess::ok("Account deleted", ()))
}

pub async fn verify(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<ApiSuccess<()>, ApiError> {
    let result = state.services.security.verify(&key).await;
    state.track(ENTITY, "verify", result)?;
    Ok(ApiSuccess::ok("Email confirmed", ()))
}

pub async fn resend(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> Result<ApiSuccess<()>, ApiError> {
    let result = state.services.security.resend(&payload).await;
    state.track(ENTITY, "resend", result)?;
    Ok(ApiSuccess::ok("Verification email sent", ()))
}
