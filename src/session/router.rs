//! Session router
//!
//! The top-level orchestrator. Owns the capture pipeline, playback pipeline
//! and protocol client, drives the session state machine from inbound
//! events, accumulates streamed deltas, and exposes the external operation
//! surface: connect, disconnect, send_text, start_audio, stop_audio,
//! interrupt.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::pipeline::{CaptureConfig, CapturePipeline};
use crate::audio::playback::PlaybackPipeline;
use crate::credentials::CredentialProvider;
use crate::protocol::client::{ClientHandle, ProtocolEvent, RealtimeClient};
use crate::protocol::connection::ConnectionConfig;
use crate::protocol::error::ProtocolError;
use crate::protocol::messages::{ClientEvent, ConversationItem, ServerEvent, SessionInfo};
use crate::session::accumulator::ResponseAccumulator;
use crate::session::events::{RouterEvent, RouterStatus};
use crate::session::state::{SessionState, StateError, StateManager};
use crate::utils::error::{AppError, AppResult, ErrorKind};
use crate::utils::subscription::{Subscribers, SubscriptionToken};

/// Router configuration
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Protocol connection settings
    pub connection: ConnectionConfig,

    /// Capture pipeline settings
    pub capture: CaptureConfig,
}

/// State shared with the protocol subscription and forwarding tasks
///
/// Everything here is mutated either by the router operations or by the
/// single inbound dispatch path, so the locks are only ever briefly held.
struct RouterInner {
    state: StateManager,
    accumulator: std::sync::Mutex<ResponseAccumulator>,
    playback: PlaybackPipeline,
    subscribers: Subscribers<RouterEvent>,
    session: std::sync::Mutex<Option<SessionInfo>>,
}

impl RouterInner {
    fn new() -> Self {
        Self {
            state: StateManager::new(),
            accumulator: std::sync::Mutex::new(ResponseAccumulator::new()),
            playback: PlaybackPipeline::new(),
            subscribers: Subscribers::new(),
            session: std::sync::Mutex::new(None),
        }
    }

    fn emit(&self, event: RouterEvent) {
        self.subscribers.emit(&event);
    }

    /// Attempt a transition and notify subscribers on success
    ///
    /// Invalid transitions are logged and swallowed; inbound events can race
    /// local operations and losing such a race is not an error.
    fn set_state(&self, new_state: SessionState) {
        let name = new_state.name();
        match self.state.transition(new_state) {
            Ok(()) => {
                self.emit(RouterEvent::StateChanged {
                    state: (*self.state.current()).clone(),
                });
            }
            Err(e) => {
                debug!("Skipping transition to {}: {}", name, e);
            }
        }
    }

    /// Fatal failure: clear transient work, enter the error state, notify
    fn fail(&self, kind: ErrorKind, message: String) {
        warn!("Session failure ({:?}): {}", kind, message);

        self.playback.clear();
        self.accumulator.lock().unwrap().reset();

        self.state.force_set(SessionState::Error(message.clone()));
        self.emit(RouterEvent::StateChanged {
            state: (*self.state.current()).clone(),
        });
        self.emit(RouterEvent::Error { kind, message });
    }

    /// Dispatch one inbound protocol event
    fn handle_protocol_event(&self, event: &ProtocolEvent) {
        match event {
            ProtocolEvent::Event(server_event) => self.handle_server_event(server_event),
            ProtocolEvent::ConnectionError { message } => {
                self.fail(ErrorKind::Connection, message.clone());
            }
        }
    }

    fn handle_server_event(&self, event: &ServerEvent) {
        match event {
            ServerEvent::SessionCreated { session } => {
                info!("Session created: {}", session.id);
                *self.session.lock().unwrap() = Some(session.clone());
                self.set_state(SessionState::Connected);
                self.emit(RouterEvent::SessionCreated {
                    session_id: session.id.clone(),
                });
            }

            ServerEvent::ResponseCreated { .. } => {
                debug!("Response started");
                self.accumulator.lock().unwrap().begin();
                self.set_state(SessionState::Responding);
            }

            ServerEvent::ResponseTextDelta { delta } => {
                let text = {
                    let mut acc = self.accumulator.lock().unwrap();
                    acc.push_delta(delta).to_string()
                };
                self.emit(RouterEvent::TextDelta {
                    delta: delta.clone(),
                    text,
                });
            }

            ServerEvent::ResponseTextDone { text } => {
                let accumulated = self.accumulator.lock().unwrap().take();
                // The delta concatenation is authoritative; the server copy
                // only fills in when no deltas arrived
                let final_text = if accumulated.is_empty() {
                    text.clone()
                } else {
                    accumulated
                };
                info!("Response text done ({} chars)", final_text.len());
                self.emit(RouterEvent::TextDone { text: final_text });
            }

            ServerEvent::ResponseAudioDelta { delta } => {
                let bytes = match STANDARD.decode(delta) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        self.emit(RouterEvent::Error {
                            kind: ErrorKind::Protocol,
                            message: format!("undecodable audio delta: {}", e),
                        });
                        return;
                    }
                };

                let len = bytes.len();
                if let Err(e) = self.playback.enqueue(&bytes) {
                    // Malformed chunk: report and keep draining the rest
                    self.emit(RouterEvent::Error {
                        kind: ErrorKind::Media,
                        message: AppError::Audio(e).user_message(),
                    });
                    return;
                }

                self.emit(RouterEvent::AudioDelta { bytes: len });
            }

            ServerEvent::ResponseAudioDone { .. } => {
                debug!("Response audio done");
                self.emit(RouterEvent::AudioDone);
            }

            ServerEvent::ResponseDone { response } => {
                if response.is_failed() {
                    if response.is_quota_exceeded() {
                        let err = AppError::QuotaExceeded(
                            response
                                .error_message()
                                .unwrap_or("insufficient quota")
                                .to_string(),
                        );
                        self.emit(RouterEvent::Error {
                            kind: ErrorKind::Quota,
                            message: err.user_message(),
                        });
                    } else {
                        self.emit(RouterEvent::Error {
                            kind: ErrorKind::Internal,
                            message: response
                                .error_message()
                                .unwrap_or("response failed")
                                .to_string(),
                        });
                    }
                }

                debug!("Response done (status: {})", response.status);
                self.set_state(SessionState::Connected);
            }

            ServerEvent::SpeechStarted { .. } => {
                self.emit(RouterEvent::SpeechStarted);
            }

            ServerEvent::SpeechStopped { .. } => {
                self.emit(RouterEvent::SpeechStopped);
            }

            ServerEvent::InputAudioBufferCommitted { .. } => {
                debug!("Input audio buffer committed");
            }

            ServerEvent::ConversationItemCreated {} => {
                debug!("Conversation item created");
            }

            ServerEvent::Error { error } => {
                let kind = if error.error_type == crate::protocol::messages::INSUFFICIENT_QUOTA {
                    ErrorKind::Quota
                } else {
                    ErrorKind::Protocol
                };
                self.emit(RouterEvent::Error {
                    kind,
                    message: error.message.clone(),
                });
            }

            ServerEvent::Other { event_type } => {
                debug!("Ignoring unhandled event type: {}", event_type);
            }
        }
    }
}

/// Top-level session orchestrator
///
/// # Example
/// ```no_run
/// use voxline::credentials::EnvCredentials;
/// use voxline::session::{RouterConfig, SessionRouter};
///
/// #[tokio::main]
/// async fn main() {
///     let mut router = SessionRouter::new(RouterConfig::default());
///
///     let _token = router.subscribe(|event| {
///         println!("event: {:?}", event);
///     });
///
///     router.connect(&EnvCredentials::new()).await.unwrap();
///     router.send_text("What's the weather like?").await.unwrap();
///     // ... later ...
///     router.disconnect().await.unwrap();
/// }
/// ```
pub struct SessionRouter {
    config: RouterConfig,
    inner: Arc<RouterInner>,
    client: Option<RealtimeClient>,
    client_token: Option<SubscriptionToken>,
    capture: Option<CapturePipeline>,
    forward_task: Option<JoinHandle<()>>,
}

impl SessionRouter {
    /// Create a router
    ///
    /// No device or network resource is touched until `connect`.
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            inner: Arc::new(RouterInner::new()),
            client: None,
            client_token: None,
            capture: None,
            forward_task: None,
        }
    }

    /// Connect to the service and configure the session
    ///
    /// Resolves once the connection is open; the session is `Connected` only
    /// after the service's `session.created` event arrives. The credential
    /// is used for the handshake and never stored.
    ///
    /// # Errors
    /// Fails fast with a state error unless idle; connection failures move
    /// the session to the error state and are returned.
    pub async fn connect(&mut self, credentials: &dyn CredentialProvider) -> AppResult<()> {
        {
            let state = self.inner.state.current();
            if !state.is_idle() {
                return Err(StateError::InvalidOperation {
                    operation: "connect",
                    state: (*state).clone(),
                }
                .into());
            }
        }

        info!("Connecting session");
        self.inner.set_state(SessionState::Connecting);

        let token = match credentials.bearer_token() {
            Ok(token) => token,
            Err(e) => {
                let err = AppError::Protocol(e);
                self.inner.fail(err.kind(), err.user_message());
                return Err(err);
            }
        };

        let client = match RealtimeClient::connect(&token, &self.config.connection).await {
            Ok(client) => client,
            Err(e) => {
                let err = AppError::Protocol(e);
                self.inner.fail(err.kind(), err.user_message());
                return Err(err);
            }
        };

        // Playback is best-effort: a missing speaker still allows a
        // text-only conversation
        if let Err(e) = self.inner.playback.start() {
            let err = AppError::Audio(e);
            warn!("Playback unavailable: {}", err);
            self.inner.emit(RouterEvent::Error {
                kind: ErrorKind::Media,
                message: err.user_message(),
            });
        }

        let inner = Arc::clone(&self.inner);
        let subscription =
            client.subscribe(move |event: &ProtocolEvent| inner.handle_protocol_event(event));

        self.client = Some(client);
        self.client_token = Some(subscription);

        Ok(())
    }

    /// Send a user text message and request a response
    ///
    /// # Errors
    /// Fails fast with a state error unless connected or listening.
    pub async fn send_text(&self, text: &str) -> AppResult<()> {
        {
            let state = self.inner.state.current();
            if !matches!(*state, SessionState::Connected | SessionState::Listening) {
                return Err(StateError::InvalidOperation {
                    operation: "send_text",
                    state: (*state).clone(),
                }
                .into());
            }
        }

        let client = self.require_client()?;

        client
            .send(ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(text),
            })
            .await?;
        client
            .send(ClientEvent::ResponseCreate { response: None })
            .await?;

        info!("Sent text message ({} chars)", text.len());
        Ok(())
    }

    /// Start streaming microphone audio to the service
    ///
    /// Each captured frame is forwarded as an `input_audio_buffer.append`.
    /// The session becomes `Listening` on the first frame unless a response
    /// is in flight. A no-op when capture is already running.
    ///
    /// # Errors
    /// Fails fast with a state error unless the session is established, or
    /// with a media error if the microphone cannot be acquired.
    pub async fn start_audio(&mut self) -> AppResult<()> {
        {
            let state = self.inner.state.current();
            if !state.is_connected() {
                return Err(StateError::InvalidOperation {
                    operation: "start_audio",
                    state: (*state).clone(),
                }
                .into());
            }
        }

        if self.capture.is_some() {
            debug!("Audio capture already running");
            return Ok(());
        }

        let handle = self.require_client()?.handle();

        let mut pipeline = CapturePipeline::new(self.config.capture.clone())?;
        let (frame_tx, frame_rx) = mpsc::channel(100);
        pipeline.start(frame_tx).await?;

        let inner = Arc::clone(&self.inner);
        let forward_task = tokio::spawn(forward_frames(frame_rx, handle, inner));

        self.capture = Some(pipeline);
        self.forward_task = Some(forward_task);

        info!("Audio streaming started");
        Ok(())
    }

    /// Stop capturing, commit the audio buffer and request a response
    ///
    /// The commit and response request are queued strictly after every
    /// pending append: the forwarder is drained before either is sent.
    ///
    /// # Errors
    /// Fails fast with a state error when capture is not running.
    pub async fn stop_audio(&mut self) -> AppResult<()> {
        let Some(mut pipeline) = self.capture.take() else {
            return Err(StateError::InvalidOperation {
                operation: "stop_audio",
                state: (*self.inner.state.current()).clone(),
            }
            .into());
        };

        info!("Stopping audio streaming");

        // Stopping the pipeline closes the frame channel; awaiting the
        // forwarder guarantees every append is queued before the commit
        pipeline.stop().await;
        drop(pipeline);

        if let Some(task) = self.forward_task.take() {
            let _ = task.await;
        }

        let client = self.require_client()?;
        client.send(ClientEvent::InputAudioBufferCommit).await?;
        client
            .send(ClientEvent::ResponseCreate { response: None })
            .await?;

        if self.inner.state.current().is_listening() {
            self.inner.set_state(SessionState::Responding);
        }

        Ok(())
    }

    /// Cancel the in-flight response
    ///
    /// Clears the playback queue and the delta accumulator immediately and
    /// forces the session back to `Connected`. Audio already handed to the
    /// output device is not recalled. Idempotent: repeated calls are no-ops
    /// and never fail.
    pub async fn interrupt(&mut self) -> AppResult<()> {
        let was_responding = self.inner.state.current().is_responding();

        self.inner.playback.clear();
        self.inner.accumulator.lock().unwrap().reset();

        if was_responding {
            if let Some(client) = &self.client {
                if client.is_open() {
                    // Best effort; the response may already be finished
                    if let Err(e) = client.send(ClientEvent::ResponseCancel).await {
                        debug!("Cancel not sent: {}", e);
                    }
                }
            }
        }

        let state = self.inner.state.current();
        if matches!(*state, SessionState::Responding | SessionState::Listening) {
            self.inner.set_state(SessionState::Connected);
        }

        info!("Interrupted");
        Ok(())
    }

    /// Tear down the session and return to idle
    ///
    /// Stops capture if active, clears and releases playback, closes the
    /// protocol client, and resets the state machine. The only way out of
    /// the error state.
    pub async fn disconnect(&mut self) -> AppResult<()> {
        info!("Disconnecting session");

        if let Some(mut pipeline) = self.capture.take() {
            pipeline.stop().await;
        }
        if let Some(task) = self.forward_task.take() {
            let _ = task.await;
        }

        self.inner.playback.clear();
        self.inner.playback.stop();
        self.inner.accumulator.lock().unwrap().reset();

        if let Some(token) = self.client_token.take() {
            if let Some(client) = &self.client {
                client.unsubscribe(token);
            }
        }
        if let Some(mut client) = self.client.take() {
            client.disconnect().await;
        }

        *self.inner.session.lock().unwrap() = None;

        if !self.inner.state.current().is_idle() {
            self.inner.state.reset();
            self.inner.emit(RouterEvent::StateChanged {
                state: SessionState::Idle,
            });
        }

        Ok(())
    }

    /// Register a notification handler
    ///
    /// Handlers receive every [`RouterEvent`]; the returned token revokes
    /// the subscription.
    pub fn subscribe(
        &self,
        handler: impl Fn(&RouterEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.inner.subscribers.add(handler)
    }

    /// Revoke a notification subscription
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.inner.subscribers.remove(token)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        (*self.inner.state.current()).clone()
    }

    /// Poll snapshot for consumers that cannot subscribe
    pub fn status(&self) -> RouterStatus {
        let state = self.state();
        RouterStatus {
            connected: state.is_connected(),
            session_id: self
                .inner
                .session
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.id.clone()),
            state,
        }
    }

    /// Whether response audio is queued or playing
    pub fn is_playing(&self) -> bool {
        self.inner.playback.is_playing()
    }

    fn require_client(&self) -> AppResult<&RealtimeClient> {
        self.client
            .as_ref()
            .ok_or(AppError::Protocol(ProtocolError::ConnectionClosed))
    }
}

/// Forward captured frames to the wire as base64 append events
///
/// Runs until the frame channel closes (capture stopped) or a send fails
/// (connection gone). Flips the session to `Listening` on the first frame
/// when no response is in flight.
async fn forward_frames(
    mut frame_rx: mpsc::Receiver<crate::audio::frame::AudioFrame>,
    handle: ClientHandle,
    inner: Arc<RouterInner>,
) {
    let mut forwarded = 0u64;

    while let Some(frame) = frame_rx.recv().await {
        if matches!(*inner.state.current(), SessionState::Connected) {
            inner.set_state(SessionState::Listening);
        }

        let audio = frame.to_base64();
        if let Err(e) = handle
            .send(ClientEvent::InputAudioBufferAppend { audio })
            .await
        {
            warn!("Dropping frame, send failed: {}", e);
            break;
        }
        forwarded += 1;
    }

    debug!("Frame forwarder stopped after {} frames", forwarded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::parse_server_event;
    use std::sync::Mutex as StdMutex;

    fn collector(
        inner: &RouterInner,
    ) -> Arc<StdMutex<Vec<RouterEvent>>> {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        inner.subscribers.add(move |event: &RouterEvent| {
            events_clone.lock().unwrap().push(event.clone());
        });
        events
    }

    fn feed(inner: &RouterInner, json: &str) {
        let event = parse_server_event(json).unwrap();
        inner.handle_protocol_event(&ProtocolEvent::Event(event));
    }

    #[test]
    fn test_session_created_connects_and_notifies() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.transition(SessionState::Connecting).unwrap();

        feed(
            &inner,
            r#"{"type":"session.created","session":{"id":"sess_42","voice":"alloy"}}"#,
        );

        assert!(inner.state.current().is_connected());
        assert_eq!(
            inner.session.lock().unwrap().as_ref().unwrap().id,
            "sess_42"
        );

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::SessionCreated { session_id } if session_id == "sess_42"
        )));
    }

    #[test]
    fn test_text_deltas_accumulate_in_arrival_order() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Connected);

        feed(&inner, r#"{"type":"response.created","response":{}}"#);
        for delta in ["Hel", "lo ", "there"] {
            feed(
                &inner,
                &format!(r#"{{"type":"response.text.delta","delta":"{}"}}"#, delta),
            );
        }
        feed(&inner, r#"{"type":"response.text.done","text":"ignored"}"#);

        let events = events.lock().unwrap();

        // Each delta notification carries the running full value
        let running: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RouterEvent::TextDelta { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(running, vec!["Hel", "Hello ", "Hello there"]);

        // The final text equals the exact concatenation of deltas
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::TextDone { text } if text == "Hello there"
        )));
    }

    #[test]
    fn test_text_done_without_deltas_uses_server_text() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Responding);

        feed(&inner, r#"{"type":"response.text.done","text":"complete"}"#);

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::TextDone { text } if text == "complete"
        )));
    }

    #[test]
    fn test_audio_delta_reaches_playback() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Responding);

        // 960 zero bytes of PCM16
        let delta = STANDARD.encode([0u8; 960]);
        feed(
            &inner,
            &format!(r#"{{"type":"response.audio.delta","delta":"{}"}}"#, delta),
        );

        assert_eq!(inner.playback.pending_chunks(), 1);
        assert!(events.lock().unwrap().iter().any(|e| matches!(
            e,
            RouterEvent::AudioDelta { bytes: 960 }
        )));
    }

    #[test]
    fn test_undecodable_audio_delta_is_skipped() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Responding);

        feed(
            &inner,
            r#"{"type":"response.audio.delta","delta":"!!!not-base64!!!"}"#,
        );

        assert_eq!(inner.playback.pending_chunks(), 0);
        assert!(events.lock().unwrap().iter().any(|e| matches!(
            e,
            RouterEvent::Error { kind: ErrorKind::Protocol, .. }
        )));
    }

    #[test]
    fn test_response_done_quota_classification() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Responding);

        feed(
            &inner,
            r#"{"type":"response.done","response":{"status":"failed",
                "status_details":{"error":{"type":"insufficient_quota","message":"over quota"}}}}"#,
        );

        // Quota error emitted and the session left the responding state
        assert!(inner.state.current().is_connected());
        assert!(!inner.state.current().is_responding());

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::Error { kind: ErrorKind::Quota, .. }
        )));
    }

    #[test]
    fn test_response_done_generic_failure() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Responding);

        feed(
            &inner,
            r#"{"type":"response.done","response":{"status":"failed",
                "status_details":{"error":{"type":"server_error","message":"boom"}}}}"#,
        );

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::Error { kind: ErrorKind::Internal, message } if message == "boom"
        )));
    }

    #[test]
    fn test_speech_markers_are_forwarded() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Listening);

        feed(&inner, r#"{"type":"input_audio_buffer.speech_started"}"#);
        feed(&inner, r#"{"type":"input_audio_buffer.speech_stopped"}"#);

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, RouterEvent::SpeechStarted)));
        assert!(events.iter().any(|e| matches!(e, RouterEvent::SpeechStopped)));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let inner = RouterInner::new();
        let events = collector(&inner);

        feed(&inner, r#"{"type":"rate_limits.updated","rate_limits":[]}"#);

        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_connection_error_enters_error_state() {
        let inner = RouterInner::new();
        let events = collector(&inner);
        inner.state.force_set(SessionState::Responding);
        inner.playback.enqueue(&[0u8; 1920]).unwrap();

        inner.handle_protocol_event(&ProtocolEvent::ConnectionError {
            message: "socket closed".to_string(),
        });

        assert!(inner.state.current().is_error());
        assert_eq!(inner.playback.pending_chunks(), 0);

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::Error { kind: ErrorKind::Connection, .. }
        )));
    }

    #[tokio::test]
    async fn test_interrupt_clears_playback_and_is_idempotent() {
        let mut router = SessionRouter::new(RouterConfig::default());
        router.inner.state.force_set(SessionState::Responding);

        // Three queued buffers
        for _ in 0..3 {
            router.inner.playback.enqueue(&[0u8; 1920]).unwrap();
        }
        assert!(router.is_playing());

        router.interrupt().await.unwrap();

        assert_eq!(router.inner.playback.pending_chunks(), 0);
        assert!(!router.is_playing());
        assert!(matches!(router.state(), SessionState::Connected));

        // Second call is a no-op and never fails
        router.interrupt().await.unwrap();
        assert!(matches!(router.state(), SessionState::Connected));
    }

    #[tokio::test]
    async fn test_operations_fail_fast_when_idle() {
        let mut router = SessionRouter::new(RouterConfig::default());

        let err = router.send_text("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let err = router.start_audio().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let err = router.stop_audio().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[tokio::test]
    async fn test_connect_rejected_while_not_idle() {
        let mut router = SessionRouter::new(RouterConfig::default());
        router.inner.state.force_set(SessionState::Connected);

        let err = router
            .connect(&crate::credentials::StaticCredentials::new("sk-test"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[tokio::test]
    async fn test_connect_with_bad_credentials_enters_error_state() {
        let mut router = SessionRouter::new(RouterConfig::default());

        let err = router
            .connect(&crate::credentials::StaticCredentials::new(""))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(router.state().is_error());

        // disconnect is the documented way out of the error state
        router.disconnect().await.unwrap();
        assert!(router.state().is_idle());
    }

    #[test]
    fn test_status_snapshot() {
        let router = SessionRouter::new(RouterConfig::default());

        let status = router.status();
        assert!(!status.connected);
        assert!(status.session_id.is_none());
        assert!(status.state.is_idle());
    }
}
