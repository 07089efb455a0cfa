//! # Errors
//!
//! Centralized error handling for the blog.
//! Expected validation failures accumulate as `Vec<ValidationError>`;
//! only infrastructure faults travel as `anyhow::Error`.

use thiserror::Error;

use crate::models::Role;

/// One problem found while validating an untrusted payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ValidationError {
    #[error("bad syntax on {field} property")]
    BadSyntax { field: String },

    #[error("{field} is required")]
    Missing { field: String },

    #[error("{field} contains invalid characters")]
    InvalidCharacters { field: String },

    #[error("{field} cannot be empty")]
    Empty { field: String },

    #[error("{field} has an invalid format")]
    InvalidFormat { field: String },

    #[error("{field} must be at least {min} characters long")]
    TooShort { field: String, min: usize },

    /// `index` is the 1-based position of the block in the body.
    #[error("block {index} is missing {property}")]
    BlockMissing { index: usize, property: &'static str },

    #[error("block {index} has invalid characters for {property}")]
    BlockInvalidCharacters { index: usize, property: &'static str },

    #[error("block {index} has bad syntax on {property}")]
    BlockBadSyntax { index: usize, property: &'static str },

    #[error("{field} creation failed because of invalid {from}")]
    SlugGenerationFailed { field: String, from: String },

    #[error("{field} already taken")]
    AlreadyTaken { field: String },

    #[error("one or more categories don't exist")]
    UnknownCategories,

    #[error("text must be different to edit the comment")]
    TextUnchanged,

    #[error("nothing to update")]
    NothingToUpdate,
}

impl ValidationError {
    /// Stable machine-readable identifier used in API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::BadSyntax { .. } => "bad_syntax",
            ValidationError::Missing { .. } => "missing",
            ValidationError::InvalidCharacters { .. } => "invalid_characters",
            ValidationError::Empty { .. } => "empty",
            ValidationError::InvalidFormat { .. } => "invalid_format",
            ValidationError::TooShort { .. } => "too_short",
            ValidationError::BlockMissing { .. } => "block_missing",
            ValidationError::BlockInvalidCharacters { .. } => "block_invalid_characters",
            ValidationError::BlockBadSyntax { .. } => "block_bad_syntax",
            ValidationError::SlugGenerationFailed { .. } => "slug_generation_failed",
            ValidationError::AlreadyTaken { .. } => "already_taken",
            ValidationError::UnknownCategories => "unknown_categories",
            ValidationError::TextUnchanged => "text_unchanged",
            ValidationError::NothingToUpdate => "nothing_to_update",
        }
    }

    /// Type-level problems. A payload carrying one of these is not sanitized further.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ValidationError::BadSyntax { .. } | ValidationError::Missing { .. }
        )
    }

    /// The field the error is about, when it concerns a single top-level field.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::BadSyntax { field }
            | ValidationError::Missing { field }
            | ValidationError::InvalidCharacters { field }
            | ValidationError::Empty { field }
            | ValidationError::InvalidFormat { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::SlugGenerationFailed { field, .. }
            | ValidationError::AlreadyTaken { field } => Some(field),
            _ => None,
        }
    }
}

/// Failure reported by a repository port.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store-level unique constraint rejected the write.
    #[error("unique constraint violated on {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Why an authorization check said no.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("{0} permission required")]
    MissingRole(Role),

    #[error("you can't modify a resource that isn't yours")]
    NotOwner,

    #[error("you can't modify content since you no longer hold the {0} role")]
    RoleRevoked(Role),
}

/// The primary error type for every service operation.
#[derive(Debug, Error)]
pub enum AppError {
    /// Accumulated payload problems (400).
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// Resource not found, or soft-deleted (404).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Missing, malformed or expired credentials (401).
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    /// The principal is under an active ban (401).
    #[error("account is banned")]
    Banned,

    /// Role or ownership check failed.
    #[error(transparent)]
    Forbidden(#[from] Denial),

    /// A business rule refused the request (400).
    #[error("{0}")]
    Rejected(String),

    /// Store, mail or crypto failure. Never shown to callers.
    #[error("internal service error: {0}")]
    Infrastructure(anyhow::Error),
}

impl AppError {
    pub fn invalid(error: ValidationError) -> Self {
        AppError::Validation(vec![error])
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(field) => match field.as_str() {
                "email" => AppError::Rejected("user already exists".to_string()),
                "slug" | "title" => AppError::invalid(ValidationError::AlreadyTaken {
                    field: "title".to_string(),
                }),
                _ => AppError::invalid(ValidationError::AlreadyTaken { field }),
            },
            StoreError::Backend(cause) => AppError::Infrastructure(cause),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Infrastructure(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role tag: {0}")]
pub struct UnknownRole(pub String);

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,
}

/// A specialized Result type for service logic.
pub type Result<T> = std::result::Result<T, AppError>;
