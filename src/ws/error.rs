//! WebSocket-specific error types for the Pacifica SDK.

use thiserror::Error;

/// WebSocket-specific errors
#[derive(Debug, Error)]
pub enum WsError {
    /// Initial connection failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Client is closed; no further operations are possible
    #[error("Client is closed")]
    Closed,

    /// Invalid subscription parameter (e.g. unsupported candle interval)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// JSON deserialization failure
    #[error("Failed to parse message: {0}")]
    MessageParseError(String),

    /// WebSocket protocol error
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    /// Invalid URL
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// Internal command channel closed
    #[error("Internal channel closed")]
    ChannelClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::Io(e) => WsError::Io(e.to_string()),
            Error::Url(e) => WsError::InvalidUrl(e.to_string()),
            Error::Http(resp) => {
                WsError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => WsError::ConnectionFailed(e.to_string()),
            other => WsError::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WsError {
    fn from(err: serde_json::Error) -> Self {
        WsError::MessageParseError(err.to_string())
    }
}

/// Result type alias for WebSocket operations
pub type WsResult<T> = Result<T, WsError>;
