//! Error types for HTTP handling.

use thiserror::Error;

/// Errors produced by handlers and the HTTP layer.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request method string is not a known HTTP verb.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The caller is not authenticated.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller is not allowed to access the resource.
    #[error("forbidden")]
    Forbidden,

    /// The requested resource does not exist.
    #[error("not found")]
    NotFound,

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An arbitrary status code with a message.
    #[error("{message}")]
    Status {
        /// HTTP status code to report.
        status: u16,
        /// Human-readable message.
        message: String,
    },

    /// An unexpected failure inside a handler.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpError {
    /// Returns the HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidMethod(_) | Self::BadRequest(_) | Self::Json(_) => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Status { status, .. } => *status,
            Self::Internal(_) => 500,
        }
    }
}

/// Result type alias for HTTP operations.
pub type Result<T> = std::result::Result<T, HttpError>;
