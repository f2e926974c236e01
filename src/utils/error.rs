//! Aggregate error handling
//!
//! Provides the unified `AppError` type across all modules, plus the
//! machine-checkable `ErrorKind` a UI layer can branch on without parsing
//! prose.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::error::AudioError;
use crate::protocol::error::ProtocolError;
use crate::session::state::StateError;

/// Application error type
///
/// Aggregates every module's error type behind a single interface.
#[derive(Error, Debug)]
pub enum AppError {
    /// Audio capture/playback error
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Protocol or transport error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid state transition or operation
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// The service reported exhausted quota
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-checkable error classification
///
/// Every error event carries one of these alongside its human-readable
/// message, so collaborators can branch without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Handshake, authentication or transport failure; fatal to the session
    Connection,
    /// Malformed or unexpected inbound message; non-fatal
    Protocol,
    /// Device unavailable or decode failure; reported per operation
    Media,
    /// Service-reported rate/billing limit
    Quota,
    /// Operation invoked in an invalid state; failed fast
    State,
    /// Anything else
    Internal,
}

impl AppError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Audio(_) => ErrorKind::Media,

            AppError::Protocol(e) => match e {
                ProtocolError::ConnectionFailed(_)
                | ProtocolError::AuthenticationFailed
                | ProtocolError::Credential(_)
                | ProtocolError::Timeout(_)
                | ProtocolError::WebSocket(_)
                | ProtocolError::Http(_)
                | ProtocolError::InvalidConfig(_) => ErrorKind::Connection,

                // Sending on a closed client is a caller mistake, not a
                // transport fault
                ProtocolError::ConnectionClosed => ErrorKind::State,

                ProtocolError::Serialization(_) | ProtocolError::MalformedEvent(_) => {
                    ErrorKind::Protocol
                }
            },

            AppError::State(_) => ErrorKind::State,
            AppError::QuotaExceeded(_) => ErrorKind::Quota,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A message suitable for direct display to the user
    pub fn user_message(&self) -> String {
        match self {
            AppError::Audio(AudioError::DeviceNotFound) => {
                "No microphone found; check your audio input settings".to_string()
            }
            AppError::Audio(AudioError::OutputDeviceNotFound) => {
                "No speaker found; check your audio output settings".to_string()
            }
            AppError::Audio(AudioError::StreamBuildFailed(_)) => {
                "Could not start audio; check microphone permissions".to_string()
            }
            AppError::Audio(AudioError::DecodeFailed(_)) => {
                "Received malformed audio; the chunk was skipped".to_string()
            }
            AppError::Audio(_) => "Audio error; check your sound devices".to_string(),

            AppError::Protocol(ProtocolError::AuthenticationFailed)
            | AppError::Protocol(ProtocolError::Credential(_)) => {
                "Invalid API credentials; update your API key".to_string()
            }
            AppError::Protocol(ProtocolError::Timeout(_)) => {
                "Connection timed out; check your network".to_string()
            }
            AppError::Protocol(ProtocolError::ConnectionClosed) => {
                "Not connected; connect before sending".to_string()
            }
            AppError::Protocol(e) if self.kind() == ErrorKind::Connection => {
                format!("Connection failed: {}", e)
            }
            AppError::Protocol(_) => "The service sent an unexpected message".to_string(),

            AppError::State(e) => e.to_string(),

            AppError::QuotaExceeded(_) => {
                "Service quota exhausted; check your plan and billing details".to_string()
            }

            AppError::Internal(msg) => format!("Internal error: {}", msg),
        }
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;
