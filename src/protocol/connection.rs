/// WebSocket connection to the realtime conversation service
///
/// This module provides the low-level connection: URL construction, the
/// authenticated upgrade handshake, and framed send/receive.
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::messages::{
    ClientEvent, ServerEvent, SessionConfig, TranscriptionConfig, TurnDetection,
    parse_server_event,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        http::{Request, Uri},
    },
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the WebSocket stream
pub type WsWriter = SplitSink<WsStream, Message>;

/// Read half of the WebSocket stream
pub type WsReader = SplitStream<WsStream>;

/// Configuration for a realtime session connection
///
/// # Example
/// ```
/// use voxline::protocol::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .with_voice("verse")
///     .with_instructions("Keep answers short.");
/// assert!(config.build_url().unwrap().contains("model="));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Service endpoint (wss://...)
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Voice identifier for audio output
    pub voice: String,

    /// System instructions for the assistant
    pub instructions: Option<String>,

    /// Requested modalities
    pub modalities: Vec<String>,

    /// Transcription model for input audio (None disables transcription)
    pub transcription_model: Option<String>,

    /// Turn-detection parameters (None disables server VAD)
    pub turn_detection: Option<TurnDetection>,

    /// Connection timeout in milliseconds
    pub timeout_ms: u64,
}

impl ConnectionConfig {
    /// Create a configuration with service defaults
    pub fn new() -> Self {
        Self {
            base_url: "wss://api.openai.com/v1/realtime".to_string(),
            model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
            voice: "alloy".to_string(),
            instructions: None,
            modalities: vec!["text".to_string(), "audio".to_string()],
            transcription_model: Some("whisper-1".to_string()),
            turn_detection: Some(TurnDetection::default()),
            timeout_ms: 10_000,
        }
    }

    /// Set the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output voice
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the system instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the connection timeout in milliseconds
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Disable server-side turn detection
    pub fn without_turn_detection(mut self) -> Self {
        self.turn_detection = None;
        self
    }

    /// Build the WebSocket URL with query parameters
    pub fn build_url(&self) -> ProtocolResult<String> {
        if self.base_url.is_empty() {
            return Err(ProtocolError::InvalidConfig("empty base URL".to_string()));
        }
        Ok(format!("{}?model={}", self.base_url, self.model))
    }

    /// The initial `session.update` event for this configuration
    ///
    /// Audio is PCM16 in both directions; the sample rate is fixed by the
    /// session contract, not negotiated here.
    pub fn session_update(&self) -> ClientEvent {
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: self.modalities.clone(),
                instructions: self.instructions.clone(),
                voice: self.voice.clone(),
                input_audio_format: "pcm16".to_string(),
                output_audio_format: "pcm16".to_string(),
                input_audio_transcription: self
                    .transcription_model
                    .clone()
                    .map(|model| TranscriptionConfig { model }),
                turn_detection: self.turn_detection.clone(),
            },
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// An open WebSocket connection to the realtime service
///
/// Manages the connection lifecycle and provides framed send/receive. Most
/// callers use [`RealtimeClient`](crate::protocol::RealtimeClient) instead,
/// which layers the writer/reader task split on top of `split()`.
#[derive(Debug)]
pub struct RealtimeConnection {
    /// WebSocket stream
    ws_stream: WsStream,

    /// Whether the connection is open
    is_open: bool,
}

impl RealtimeConnection {
    /// Connect and authenticate
    ///
    /// # Arguments
    /// * `bearer_token` - API credential, used for this handshake only
    /// * `config` - Connection configuration
    ///
    /// # Errors
    /// Returns `ProtocolError::AuthenticationFailed` on a 401 response,
    /// `ProtocolError::Timeout` if the handshake exceeds the configured
    /// timeout, and `ProtocolError::ConnectionFailed` otherwise.
    pub async fn connect(bearer_token: &str, config: &ConnectionConfig) -> ProtocolResult<Self> {
        info!("Connecting to realtime service");

        let url = config.build_url()?;
        debug!("Connection URL: {}", url);

        let uri: Uri = url
            .parse()
            .map_err(|e| ProtocolError::InvalidConfig(format!("Invalid URL: {}", e)))?;

        let host = uri
            .host()
            .ok_or_else(|| ProtocolError::InvalidConfig("URL has no host".to_string()))?
            .to_string();

        let request = Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", bearer_token))
            .header("OpenAI-Beta", "realtime=v1")
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .body(())
            .map_err(|e| ProtocolError::Http(e.to_string()))?;

        let connect_future = connect_async(request);
        let timeout = tokio::time::Duration::from_millis(config.timeout_ms);

        let (ws_stream, response) = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| ProtocolError::Timeout(config.timeout_ms))?
            .map_err(|e| {
                if let tokio_tungstenite::tungstenite::Error::Http(resp) = &e {
                    if resp.status() == 401 {
                        return ProtocolError::AuthenticationFailed;
                    }
                }
                ProtocolError::ConnectionFailed(e.to_string())
            })?;

        info!("Connected to realtime service (status: {})", response.status());

        Ok(Self {
            ws_stream,
            is_open: true,
        })
    }

    /// Send a serializable event
    ///
    /// # Errors
    /// Returns `ProtocolError::ConnectionClosed` when the connection has
    /// been closed, or a serialization/transport error.
    pub async fn send<T: Serialize>(&mut self, event: &T) -> ProtocolResult<()> {
        if !self.is_open {
            return Err(ProtocolError::ConnectionClosed);
        }

        let json = serde_json::to_string(event)?;
        debug!("Sending event: {} bytes", json.len());

        self.ws_stream
            .send(Message::Text(json.into()))
            .await
            .map_err(ProtocolError::WebSocket)?;

        Ok(())
    }

    /// Receive the next server event
    ///
    /// # Returns
    /// * `Ok(Some(event))` - An event was received
    /// * `Ok(None)` - Connection closed gracefully
    /// * `Err(error)` - Transport or parse failure
    pub async fn recv(&mut self) -> ProtocolResult<Option<ServerEvent>> {
        if !self.is_open {
            return Ok(None);
        }

        match self.ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("Received message: {} bytes", text.len());
                let event = parse_server_event(&text)?;
                Ok(Some(event))
            }
            Some(Ok(Message::Close(frame))) => {
                info!("Received close frame: {:?}", frame);
                self.is_open = false;
                Ok(None)
            }
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                self.ws_stream.send(Message::Pong(data)).await?;
                Box::pin(self.recv()).await
            }
            Some(Ok(Message::Pong(_))) => {
                debug!("Received pong");
                Box::pin(self.recv()).await
            }
            Some(Ok(msg)) => {
                warn!("Received unexpected message type: {:?}", msg);
                Box::pin(self.recv()).await
            }
            Some(Err(e)) => {
                self.is_open = false;
                Err(ProtocolError::WebSocket(e))
            }
            None => {
                info!("WebSocket stream ended");
                self.is_open = false;
                Ok(None)
            }
        }
    }

    /// Close the connection
    pub async fn close(&mut self) -> ProtocolResult<()> {
        if !self.is_open {
            return Ok(());
        }

        info!("Closing WebSocket connection");

        self.ws_stream
            .close(None)
            .await
            .map_err(ProtocolError::WebSocket)?;

        self.is_open = false;
        Ok(())
    }

    /// Whether the connection is open
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Split into independent read and write halves
    pub fn split(self) -> (WsWriter, WsReader) {
        self.ws_stream.split()
    }
}
