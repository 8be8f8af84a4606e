//! # Error Handling and Response Types
//!
//! Errors raised by the crawler and the read-side HTTP surface.
//!
//! ## Taxonomy
//!
//! - **Network** ([`AppError::Network`]): transport-level failures that survived the
//!   retry budget. Fatal for a single request, never for a whole crawl unless the
//!   request was the catalog listing.
//! - **Protocol** ([`AppError::Protocol`]): the index answered with something that
//!   does not match the expected schema. Never retried.
//! - **Store** ([`AppError::Store`]): SQLite failures. Not expected in normal
//!   operation and treated as fatal by the pipeline.
//! - **Validation** ([`AppError::BadRequest`]): rejected query parameters.
//! - **Not found** ([`AppError::NotFound`]): a request for a route the server
//!   does not have.
//!
//! A package whose detail endpoint is unavailable is *not* an error; the client
//! reports it as `None`.
//!
//! ## Error Response Format
//!
//! ```json
//! {
//!   "error": "limit must be between 1 and 100, got 0",
//!   "code": "validation_error",
//!   "details": null,
//!   "timestamp": "2024-01-01T12:00:00Z"
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

/// Standardized error response structure for consistent API error handling
#[derive(Serialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,          // Human-readable error message
    pub code: String,           // Machine-readable error code
    pub details: Option<Value>, // Additional error details
    pub timestamp: String,      // ISO 8601 timestamp
}

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    UpstreamError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application-specific error types with error codes
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("network error requesting {url}: {message}")]
    Network { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Protocol { url: String, message: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        AppError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn protocol(url: impl Into<String>, message: impl ToString) -> Self {
        AppError::Protocol {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest(_) => ErrorCode::ValidationError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Network { .. } | AppError::Protocol { .. } => ErrorCode::UpstreamError,
            AppError::Store(_)
            | AppError::Json(_)
            | AppError::Io(_)
            | AppError::Config(_)
            | AppError::InternalError(_)
            | AppError::Anyhow(_) => ErrorCode::InternalError,
        }
    }

    /// Get additional error details if available
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::Network { url, .. } | AppError::Protocol { url, .. } => {
                Some(json!({ "url": url }))
            }
            AppError::Anyhow(e) => e
                .source()
                .map(|source| json!({"source": source.to_string()})),
            _ => None,
        }
    }

    /// Create a standardized error response
    pub fn to_error_response(&self) -> ApiErrorResponse {
        let code = self.error_code();
        ApiErrorResponse {
            error: self.to_string(),
            code: code.as_str().to_string(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.error_code().http_status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, axum::Json(self.to_error_response())).into_response()
    }
}

/// Convenient result type for crawler and query operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::BadRequest("bad".into()).error_code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            AppError::network("https://pypi.org/simple/", "connection reset").error_code(),
            ErrorCode::UpstreamError
        );
        assert_eq!(
            AppError::Store(rusqlite::Error::InvalidQuery).error_code(),
            ErrorCode::InternalError
        );
        assert_eq!(ErrorCode::ValidationError.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_serialization_failure_is_internal() {
        let err: AppError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
        assert_eq!(
            err.error_code().http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::NotFound("no route for /nope".into()).error_code(),
            ErrorCode::NotFound
        );
    }

    #[test]
    fn test_error_response_includes_url_details() {
        let err = AppError::protocol("https://pypi.org/pypi/flask/json", "missing field `info`");
        let response = err.to_error_response();
        assert_eq!(response.code, "upstream_error");
        assert_eq!(
            response.details,
            Some(json!({"url": "https://pypi.org/pypi/flask/json"}))
        );
        assert!(response.error.contains("missing field"));
    }
}
