//! Error types for the task tracker.
//!
//! `TrackerError` carries the domain taxonomy used across the store
//! backends, the server and the wait client; `ApiError` is the HTTP
//! projection of it.

use std::time::Duration;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

/// Main error type for task tracking operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// No task/record exists for the given identifier
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Caller-supplied value violates a precondition
    #[error("Invalid argument: {0}")]
    Invalid(String),

    /// Mutation attempted on a task that already reached a terminal state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The wait client exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The tracked work itself reported failure. This is the business
    /// outcome of the task, not a subsystem error.
    #[error("{0}")]
    TaskFailed(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Backend storage error (redb, redis, cache)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Internal error (unexpected)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::Internal(format!("request failed: {err}"))
    }
}

/// Error type for API operations (converts to HTTP responses).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }))
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::NotFound(msg) => ApiError::NotFound(msg),
            TrackerError::Invalid(msg) => ApiError::BadRequest(msg),
            TrackerError::Conflict(msg) => ApiError::Conflict(msg),
            TrackerError::Database(e) => {
                log::error!("Database error: {}", e);
                ApiError::InternalServerError("Database error".to_string())
            }
            TrackerError::Pool(e) => {
                log::error!("Pool error: {}", e);
                ApiError::InternalServerError("Connection pool error".to_string())
            }
            _ => {
                log::error!("Internal error: {}", err);
                ApiError::InternalServerError("Internal server error".to_string())
            }
        }
    }
}

/// Result type alias for task tracking operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
