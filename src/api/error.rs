//! Error types for the Pacifica REST API client.

use serde::Deserialize;
use thiserror::Error;

use crate::sign::SignError;

/// Error body returned by the Pacifica API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Venue error code, when the venue assigned one
    #[serde(default)]
    pub code: Option<i64>,
}

impl ErrorResponse {
    /// Create an error response from plain text (when the body is not JSON).
    pub fn from_text(text: String) -> Self {
        Self {
            error: text,
            code: None,
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.error, code),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Errors from the Pacifica REST API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The venue rejected the request (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(ErrorResponse),

    /// Rate limited (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(ErrorResponse),

    /// Server-side error (HTTP 5xx)
    #[error("Server error: {0}")]
    ServerError(ErrorResponse),

    /// Unexpected HTTP status code
    #[error("Unexpected status {0}: {1}")]
    UnexpectedStatus(u16, ErrorResponse),

    /// The venue answered 200 but reported failure in the body
    #[error("API error: {0}")]
    Api(ErrorResponse),

    /// HTTP/network error from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(String),

    /// Invalid parameter, caught before any network traffic
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Request signing failed
    #[error("Signing error: {0}")]
    Sign(#[from] SignError),
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
