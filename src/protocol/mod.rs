/// Realtime protocol layer
///
/// This module provides the persistent WebSocket connection to the
/// conversational AI service: typed wire events, the authenticated
/// connection, and the client with its single-writer/single-reader task
/// discipline.

/// Protocol client with writer/reader tasks and subscriptions
pub mod client;

/// WebSocket connection management
pub mod connection;

/// Protocol error types
pub mod error;

/// Wire event type definitions
pub mod messages;

// Re-export commonly used types
pub use client::{ClientHandle, ProtocolEvent, RealtimeClient};
pub use connection::{ConnectionConfig, RealtimeConnection, WsReader, WsWriter};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    ClientEvent, ConversationItem, ErrorInfo, ResponseOutcome, ServerEvent, SessionConfig,
    SessionInfo, TurnDetection, parse_server_event,
};
