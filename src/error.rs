//! Error types.
//!
//! [`LedgerError`] is everything the allocator and the balance engine can
//! fail with. [`ApiError`] adds the collaborator failures seen by the HTTP
//! layer and maps every kind to a status code.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("missing or invalid authorization")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(#[from] mongodb::error::Error),
    #[error("storage encoding error: {0}")]
    Encoding(#[from] bson::ser::Error),
    #[error("storage request timed out")]
    Timeout,
}

impl ApiError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(LedgerError::Validation(_)) => "VALIDATION_ERROR",
            Self::Ledger(LedgerError::NotFound(_)) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Storage(_) | Self::Encoding(_) => "STORAGE_ERROR",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Ledger(LedgerError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }))
    }
}
