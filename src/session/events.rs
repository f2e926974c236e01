use serde::Serialize;

use crate::session::state::SessionState;
use crate::utils::error::ErrorKind;

/// Notifications pushed to router subscribers
///
/// A UI layer subscribes to these instead of polling; every state machine
/// transition, streamed delta and error surfaces here.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum RouterEvent {
    /// The service confirmed session creation
    SessionCreated { session_id: String },

    /// The session state machine moved to a new state
    StateChanged { state: SessionState },

    /// A text fragment arrived; `text` is the full accumulated value
    TextDelta { delta: String, text: String },

    /// The response text is complete
    TextDone { text: String },

    /// An audio chunk was forwarded to playback
    AudioDelta { bytes: usize },

    /// The response audio is complete
    AudioDone,

    /// Server-side VAD detected the start of user speech
    SpeechStarted,

    /// Server-side VAD detected the end of user speech
    SpeechStopped,

    /// An error occurred; `kind` is machine-checkable
    Error { kind: ErrorKind, message: String },
}

/// Poll snapshot of the router
///
/// Push notifications via [`RouterEvent`] are the primary interface; this
/// snapshot remains for consumers that cannot subscribe.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    /// Current session state
    pub state: SessionState,

    /// Whether a session is established
    pub connected: bool,

    /// Session identifier, when one has been created
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = RouterEvent::TextDelta {
            delta: "lo".to_string(),
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"TextDelta\""));
        assert!(json.contains("\"delta\":\"lo\""));
        assert!(json.contains("\"text\":\"hello\""));
    }

    #[test]
    fn test_error_event_carries_kind() {
        let event = RouterEvent::Error {
            kind: ErrorKind::Quota,
            message: "quota exhausted".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"QUOTA\""));
        assert!(json.contains("quota exhausted"));
    }

    #[test]
    fn test_status_serialization() {
        let status = RouterStatus {
            state: SessionState::Connected,
            connected: true,
            session_id: Some("sess_1".to_string()),
        };
        let json = serde_json::to_string(&status).unwrap();

        assert!(json.contains("\"connected\":true"));
        assert!(json.contains("sess_1"));
    }
}
