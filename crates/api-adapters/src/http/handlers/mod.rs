use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use domains::AppError;

use super::{ApiError, AppState};

pub mod admin;
pub mod articles;
pub mod categories;
pub mod comments;
pub mod profiles;
pub mod security;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Infrastructure(anyhow::Error::from(e)))?;
    Ok((
        [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        body,
    ))
}
