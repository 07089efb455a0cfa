use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde_json::Value;

use domains::models::Principal;
use domains::{AppError, ValidationError};

use super::{ApiError, AppState};

/// The authenticated caller. Accepts `Authorization: Bearer <token>` or
/// the `x-auth-token` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let headers = &parts.headers;
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get("x-auth-token").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or(AppError::Unauthenticated("no token, access denied"))?;
        let principal = state.services.security.principal_from_token(token).await?;
        Ok(AuthUser(principal))
    }
}

/// Untyped JSON body. Anything that does not parse is handed to the
/// validator as `null`, which reports it as bad syntax on the body.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|_| {
            AppError::invalid(ValidationError::BadSyntax { field: "body".to_string() })
        })?;
        Ok(JsonBody(serde_json::from_slice(&bytes).unwrap_or(Value::Null)))
    }
}
