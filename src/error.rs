//! Error types for survey-stats
//!
//! Every error surfaced to the HTTP boundary carries a human-readable
//! message and maps to a `{ "error": message }` JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Common result type for survey-stats operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Submission failed validation (caller error, no retry)
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// Unknown date key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Export or report requested against an empty store
    #[error("No data available")]
    NoData,

    /// Backing store unreachable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Persisted content unreadable; never auto-repaired or silently discarded
    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error (wraps serde_json::Error)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidSubmission(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) | Error::NoData => StatusCode::NOT_FOUND,
            Error::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::CorruptState(_)
            | Error::Database(_)
            | Error::Serialization(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
