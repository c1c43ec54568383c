//! Error types shared across the crate.
//!
//! - [`StoreError`] - failures of the storage core (key allocation and both backends)
//! - [`AuditError`] - failures of a single audit sink delivery
//! - [`QueueError`] - a background pipeline no longer accepts work
//! - [`AppError`] - HTTP-facing error rendered as a JSON body

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors produced by the storage core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Every key length up to the configured maximum collided.
    #[error("key space exhausted (initial length {initial_length}, max length {max_length})")]
    KeySpaceExhausted {
        initial_length: usize,
        max_length: usize,
    },

    /// The URL is already shortened; `key` is the existing short key.
    #[error("URL {url} already exists with key {key}")]
    DuplicateUrl { key: String, url: String },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation timed out: {0}")]
    Timeout(String),

    #[error("storage query failed: {0}")]
    Query(String),

    #[error("stored data is invalid: {0}")]
    InvalidData(String),

    #[error("cold log failure: {0}")]
    ColdLog(String),
}

impl StoreError {
    /// Returns the existing key when this is a duplicate-URL signal.
    pub fn duplicate_key(&self) -> Option<&str> {
        match self {
            StoreError::DuplicateUrl { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Errors raised by an audit sink for one event.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit endpoint error: {0}")]
    Http(String),
}

/// A background pipeline has been shut down.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("{0} queue is closed")]
    Closed(&'static str),
}

/// Error details serialized into every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// HTTP-facing application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    Unauthorized { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Conflict { message: String, details: Value },
    #[error("{message}")]
    Gone { message: String, details: Value },
    #[error("{message}")]
    Internal { message: String, details: Value },
    #[error("{message}")]
    Unavailable { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn unauthorized(message: impl Into<String>, details: Value) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn gone(message: impl Into<String>, details: Value) -> Self {
        Self::Gone {
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }
    pub fn unavailable(message: impl Into<String>, details: Value) -> Self {
        Self::Unavailable {
            message: message.into(),
            details,
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, &str, &Value) {
        match self {
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
            ),
            AppError::Unauthorized { message, details } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message, details)
            }
            AppError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
            AppError::Conflict { message, details } => {
                (StatusCode::CONFLICT, "conflict", message, details)
            }
            AppError::Gone { message, details } => (StatusCode::GONE, "gone", message, details),
            AppError::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                details,
            ),
            AppError::Unavailable { message, details } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                message,
                details,
            ),
        }
    }

    /// HTTP status this error renders with.
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    /// Converts the error into its serializable body.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (_, code, message, details) = self.parts();
        ErrorInfo {
            code,
            message: message.to_string(),
            details: details.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUrl { key, url } => AppError::conflict(
                "URL already shortened",
                json!({ "key": key, "url": url }),
            ),
            StoreError::Unavailable(reason) | StoreError::Timeout(reason) => {
                tracing::error!("Storage unavailable: {}", reason);
                AppError::unavailable("Storage unavailable", json!({}))
            }
            other => {
                tracing::error!("Storage error: {}", other);
                AppError::internal("Storage error", json!({}))
            }
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::unavailable(err.to_string(), json!({}))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::bad_request("Validation failed", json!({ "fields": errors.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err: AppError = StoreError::DuplicateUrl {
            key: "abcDEF".to_string(),
            url: "https://example.com".to_string(),
        }
        .into();

        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_error_info().details["key"], "abcDEF");
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        let err: AppError = StoreError::Unavailable("pool closed".to_string()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_exhausted_maps_to_internal() {
        let err: AppError = StoreError::KeySpaceExhausted {
            initial_length: 1,
            max_length: 2,
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_error_info().code, "internal_error");
    }

    #[test]
    fn test_duplicate_key_accessor() {
        let dup = StoreError::DuplicateUrl {
            key: "k".to_string(),
            url: "u".to_string(),
        };
        assert_eq!(dup.duplicate_key(), Some("k"));
        assert_eq!(StoreError::Query("x".to_string()).duplicate_key(), None);
    }
}
