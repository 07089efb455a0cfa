//! Response envelopes. Every body carries `code`, `status` and `message`;
//! successes add `data`, validation failures add `errors`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use domains::{AppError, ValidationError};

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    code: u16,
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl<T: Serialize> Envelope<T> {
    fn new(status: StatusCode, message: String) -> Self {
        Self {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or(""),
            message,
            data: None,
            errors: None,
        }
    }
}

/// One entry of the `errors` array.
#[derive(Debug, Serialize)]
struct FieldError {
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    message: String,
}

impl From<&ValidationError> for FieldError {
    fn from(e: &ValidationError) -> Self {
        Self {
            code: e.code(),
            field: e.field().map(str::to_string),
            message: e.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiSuccess<T: Serialize> {
    status: StatusCode,
    message: &'static str,
    data: T,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn ok(message: &'static str, data: T) -> Self {
        Self { status: StatusCode::OK, message, data }
    }

    pub fn created(message: &'static str, data: T) -> Self {
        Self { status: StatusCode::CREATED, message, data }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        let mut body = Envelope::new(self.status, self.message.to_string());
        body.data = Some(self.data);
        (self.status, Json(body)).into_response()
    }
}

/// HTTP face of [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) | AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) | AppError::Banned | AppError::Forbidden(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            AppError::Validation(errors) => match errors.as_slice() {
                [only] => only.to_string(),
                _ => "validation failed".to_string(),
            },
            AppError::Unauthenticated(reason) => (*reason).to_string(),
            AppError::Infrastructure(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self.0 {
            AppError::Infrastructure(cause) => {
                tracing::error!(error = ?cause, status = status.as_u16(), "request failed");
            }
            other => {
                tracing::debug!(error = %other, status = status.as_u16(), "request rejected");
            }
        }

        let mut body = Envelope::<()>::new(status, self.message());
        if let AppError::Validation(errors) = &self.0 {
            body.errors = Some(errors.iter().map(FieldError::from).collect());
        }
        (status, Json(body)).into_response()
    }
}
