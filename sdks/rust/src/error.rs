//! Error types for the SharedMap SDK

use thiserror::Error;

/// Result type alias for SharedMap SDK operations
pub type Result<T> = std::result::Result<T, SharedMapError>;

/// SharedMap SDK error types
#[derive(Error, Debug)]
pub enum SharedMapError {
    /// Key argument was empty
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Frame could not be decoded into an envelope
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Failure reported by the transport adapter
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// URL scheme does not match the transport shape
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Errors surfaced through a transport's error event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// WebSocket handshake or frame error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// HTTP request could not be sent
    #[error("HTTP error: {0}")]
    Http(String),

    /// Write endpoint answered with a non-success status
    #[error("Write rejected with status {0}")]
    Status(u16),

    /// Event subscription stream failed mid-flight
    #[error("Stream error: {0}")]
    Stream(String),

    /// Underlying connection is gone
    #[error("Connection closed")]
    ConnectionClosed,
}

impl TransportError {
    /// Whether the error means the inbound channel itself is lost.
    ///
    /// Write failures on the split transport are not fatal: the event
    /// subscription stays up and the map stays online.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::WebSocket(_) | Self::Stream(_) | Self::ConnectionClosed => true,
            Self::Http(_) | Self::Status(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Http(err.to_string()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(other.to_string()),
        }
    }
}
