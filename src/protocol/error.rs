/// Protocol error types for the realtime connection
///
/// This module defines error types used throughout the protocol layer.
use thiserror::Error;

/// Protocol-related errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Failed to connect to the service
    #[error("Failed to connect to service: {0}")]
    ConnectionFailed(String),

    /// Authentication failed (invalid bearer token)
    #[error("Authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// No usable credential was supplied
    #[error("Credential error: {0}")]
    Credential(String),

    /// Connection timeout
    #[error("Connection timeout after {0}ms")]
    Timeout(u64),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Failed to serialize or deserialize a message
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound message of a known type had a malformed payload
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Failed to build the HTTP upgrade request
    #[error("Failed to build HTTP request: {0}")]
    Http(String),

    /// Operation attempted on a closed connection
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl From<tokio_tungstenite::tungstenite::http::Error> for ProtocolError {
    fn from(err: tokio_tungstenite::tungstenite::http::Error) -> Self {
        ProtocolError::Http(err.to_string())
    }
}
