// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.
//!
//! Errors are classified by kind rather than by source: call sites branch
//! on the variant (retry transient failures, surface conflicts as 409, and
//! so on) instead of inspecting concrete upstream error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Network hiccup, database unavailable, upstream 5xx. Retryable.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Upstream 429 after backoff was exhausted.
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Upstream 4xx (other than 429) or malformed payload. Not retryable.
    #[error("permanent upstream failure: {0}")]
    Permanent(String),

    /// Unique-constraint violation or a job already running.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Requested user/activity/city/area/job does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied a bad parameter.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl AppError {
    /// Stable kind label, used in logs and job error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Transient(_) => "transient",
            AppError::RateLimit(_) => "rate_limit",
            AppError::Permanent(_) => "permanent",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Invalid(_) => "invalid",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) => {
                // 23505 unique_violation, 23514 check_violation
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                if code == "23505" || code == "23514" {
                    AppError::Conflict(db.message().to_string())
                } else {
                    AppError::Transient(db.message().to_string())
                }
            }
            _ => AppError::Transient(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transient(err.to_string())
    }
}

/// JSON error envelope returned to API callers.
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorBody {
    pub fn new(code: StatusCode, message: &str, details: Option<String>) -> Self {
        Self {
            code: code.as_u16(),
            message: message.to_string(),
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Transient(msg) => {
                tracing::error!(error = %msg, "Transient error in request handler");
                (StatusCode::INTERNAL_SERVER_ERROR, "Transient failure")
            }
            AppError::RateLimit(_) => (StatusCode::SERVICE_UNAVAILABLE, "Rate limit exceeded"),
            AppError::Permanent(msg) => {
                tracing::error!(error = %msg, "Upstream error in request handler");
                (StatusCode::BAD_GATEWAY, "Upstream failure")
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            AppError::Invalid(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        };

        let details = match &self {
            // Do not leak database/upstream internals to callers.
            AppError::Transient(_) => None,
            other => Some(other.to_string()),
        };

        let body = ErrorBody::new(status, message, details);
        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services.
pub type Result<T> = std::result::Result<T, AppError>;
