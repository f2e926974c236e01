/// Wire event types for the realtime conversation protocol
///
/// This module defines the serializable/deserializable events exchanged over
/// the persistent WebSocket connection. Every event is a JSON object
/// discriminated by its `type` field.
use serde::{Deserialize, Serialize};

/// Error type string the service uses for exhausted quota
pub const INSUFFICIENT_QUOTA: &str = "insufficient_quota";

// ============================================================================
// Client -> Server Events
// ============================================================================

/// A client-to-server event
///
/// Serialized with the discriminator in the `type` field.
///
/// # Example
/// ```
/// use voxline::protocol::messages::ClientEvent;
///
/// let event = ClientEvent::InputAudioBufferAppend {
///     audio: "SGVsbG8=".to_string(),
/// };
/// let json = serde_json::to_string(&event).unwrap();
/// assert!(json.contains("\"type\":\"input_audio_buffer.append\""));
/// ```
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update the session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Add a user item to the conversation
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Trigger the model to create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseParams>,
    },

    /// Append base64-encoded PCM16 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Commit the input audio buffer as a user turn
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Cancel the in-progress response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// Returns the event discriminator string
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate { .. } => "response.create",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
            Self::ResponseCancel => "response.cancel",
        }
    }
}

/// Session configuration sent in `session.update`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Requested modalities ("text", "audio")
    pub modalities: Vec<String>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice identifier for audio output
    pub voice: String,

    /// Input audio format (always "pcm16")
    pub input_audio_format: String,

    /// Output audio format (always "pcm16")
    pub output_audio_format: String,

    /// Transcription settings for input audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,

    /// Server-side turn detection settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription settings
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TranscriptionConfig {
    /// Transcription model identifier
    pub model: String,
}

/// Server-side voice activity detection parameters
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TurnDetection {
    /// Detection type ("server_vad")
    #[serde(rename = "type")]
    pub detection_type: String,

    /// Activation threshold (0.0 - 1.0)
    pub threshold: f32,

    /// Audio included before detected speech, in milliseconds
    pub prefix_padding_ms: u32,

    /// Silence duration that ends a turn, in milliseconds
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            detection_type: "server_vad".to_string(),
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// A conversation item sent in `conversation.item.create`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConversationItem {
    /// Item type (always "message")
    #[serde(rename = "type")]
    pub item_type: String,

    /// Speaker role
    pub role: String,

    /// Content parts
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    /// Build a user text message item
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: "user".to_string(),
            content: vec![ContentPart {
                content_type: "input_text".to_string(),
                text: text.into(),
            }],
        }
    }
}

/// One content part of a conversation item
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ContentPart {
    /// Content type ("input_text")
    #[serde(rename = "type")]
    pub content_type: String,

    /// Text payload
    pub text: String,
}

/// Optional per-response overrides sent with `response.create`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResponseParams {
    /// Modalities for this response
    pub modalities: Vec<String>,

    /// One-off instructions for this response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ============================================================================
// Server -> Client Events
// ============================================================================

/// Events received from the service
///
/// Deserialized based on the `type` discriminator. Unknown discriminators
/// are surfaced as [`ServerEvent::Other`] by [`parse_server_event`] rather
/// than being dropped.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The session has been created
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    /// A response has started
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: Option<ResponseHead>,
    },

    /// Incremental text fragment of the in-flight response
    #[serde(rename = "response.text.delta")]
    ResponseTextDelta { delta: String },

    /// The response text is complete
    #[serde(rename = "response.text.done")]
    ResponseTextDone {
        #[serde(default)]
        text: String,
    },

    /// Incremental base64 PCM16 audio of the in-flight response
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },

    /// The response audio is complete
    #[serde(rename = "response.audio.done")]
    ResponseAudioDone {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// The response has finished (successfully or not)
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseOutcome },

    /// Server-side VAD detected the start of speech
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Server-side VAD detected the end of speech
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// The input audio buffer was committed
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// A conversation item was created server-side
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {},

    /// The service reported an error
    #[serde(rename = "error")]
    Error { error: ErrorInfo },

    /// An event type this client does not recognize
    ///
    /// Never produced by serde directly; constructed by
    /// [`parse_server_event`] so the router can log or ignore it.
    #[serde(skip)]
    Other { event_type: String },
}

impl ServerEvent {
    /// Returns the event discriminator string
    pub fn event_type(&self) -> &str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseTextDelta { .. } => "response.text.delta",
            Self::ResponseTextDone { .. } => "response.text.done",
            Self::ResponseAudioDelta { .. } => "response.audio.delta",
            Self::ResponseAudioDone { .. } => "response.audio.done",
            Self::ResponseDone { .. } => "response.done",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::ConversationItemCreated { .. } => "conversation.item.created",
            Self::Error { .. } => "error",
            Self::Other { event_type } => event_type,
        }
    }

    /// Whether this is a streaming delta event
    pub fn is_delta(&self) -> bool {
        matches!(
            self,
            Self::ResponseTextDelta { .. } | Self::ResponseAudioDelta { .. }
        )
    }
}

/// Discriminators this client recognizes; anything else becomes
/// [`ServerEvent::Other`]
const KNOWN_SERVER_EVENT_TYPES: &[&str] = &[
    "session.created",
    "response.created",
    "response.text.delta",
    "response.text.done",
    "response.audio.delta",
    "response.audio.done",
    "response.done",
    "input_audio_buffer.speech_started",
    "input_audio_buffer.speech_stopped",
    "input_audio_buffer.committed",
    "conversation.item.created",
    "error",
];

/// Parse one inbound message into a [`ServerEvent`]
///
/// Unknown discriminators decode to [`ServerEvent::Other`]. A known
/// discriminator with a malformed payload is a protocol error: the message
/// is reported (and dropped by the caller) rather than misclassified.
///
/// # Errors
/// Returns `ProtocolError::MalformedEvent` when the message is not a JSON
/// object with a string `type`, or a known event fails to decode.
pub fn parse_server_event(text: &str) -> crate::protocol::error::ProtocolResult<ServerEvent> {
    use crate::protocol::error::ProtocolError;

    let value: serde_json::Value = serde_json::from_str(text)?;

    let event_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ProtocolError::MalformedEvent("missing type discriminator".to_string()))?
        .to_string();

    if !KNOWN_SERVER_EVENT_TYPES.contains(&event_type.as_str()) {
        return Ok(ServerEvent::Other { event_type });
    }

    serde_json::from_value(value)
        .map_err(|e| ProtocolError::MalformedEvent(format!("{}: {}", event_type, e)))
}

/// Session details from `session.created`
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Unique session identifier
    pub id: String,

    /// Model serving the session
    #[serde(default)]
    pub model: Option<String>,

    /// Negotiated modalities
    #[serde(default)]
    pub modalities: Vec<String>,

    /// Negotiated voice
    #[serde(default)]
    pub voice: Option<String>,
}

/// Minimal response identification on `response.created`
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseHead {
    /// Response identifier
    #[serde(default)]
    pub id: Option<String>,
}

/// Final response status from `response.done`
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseOutcome {
    /// Final status ("completed", "failed", "cancelled", ...)
    #[serde(default)]
    pub status: String,

    /// Failure details, present when the status is not success
    #[serde(default)]
    pub status_details: Option<StatusDetails>,
}

impl ResponseOutcome {
    /// Whether the response ended in failure
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }

    /// The embedded error type string, if any
    pub fn error_type(&self) -> Option<&str> {
        self.status_details
            .as_ref()
            .and_then(|d| d.error.as_ref())
            .map(|e| e.error_type.as_str())
    }

    /// Whether the failure was caused by exhausted quota
    pub fn is_quota_exceeded(&self) -> bool {
        self.error_type() == Some(INSUFFICIENT_QUOTA)
    }

    /// The embedded error message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.status_details
            .as_ref()
            .and_then(|d| d.error.as_ref())
            .map(|e| e.message.as_str())
    }
}

/// Failure details embedded in `response.done`
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StatusDetails {
    /// Status detail type
    #[serde(rename = "type", default)]
    pub detail_type: Option<String>,

    /// The underlying error, if reported
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error payload carried by `error` events and failed responses
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Machine-checkable error type
    #[serde(rename = "type", default)]
    pub error_type: String,

    /// Optional error code
    #[serde(default)]
    pub code: Option<String>,
}
