/// Realtime protocol client
///
/// Owns an open connection and layers two tasks on top of its split halves:
/// a writer task draining a single outbound channel (so concurrent senders
/// can never interleave partial wire writes) and a reader task that parses
/// inbound messages and dispatches them to subscribers in arrival order.
use crate::protocol::connection::{ConnectionConfig, RealtimeConnection, WsReader, WsWriter};
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::messages::{ClientEvent, ServerEvent, parse_server_event};
use crate::utils::subscription::{Subscribers, SubscriptionToken};
use futures_util::{SinkExt, StreamExt};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Outbound channel depth; appends from capture dominate the traffic
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Consecutive parse failures treated as a structural desync
const MAX_CONSECUTIVE_PARSE_FAILURES: u32 = 3;

/// What subscribers receive from the client
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// A parsed inbound server event
    Event(ServerEvent),

    /// The connection failed; emitted at most once per connection attempt
    ConnectionError { message: String },
}

/// Cloneable sending handle for background tasks
///
/// Shares the client's outbound channel, so sends from any number of holders
/// are still serialized through the single writer task.
#[derive(Clone)]
pub struct ClientHandle {
    outbound_tx: mpsc::Sender<ClientEvent>,
    open: Arc<AtomicBool>,
}

impl ClientHandle {
    /// Queue an event for transmission
    ///
    /// # Errors
    /// Fails fast with `ProtocolError::ConnectionClosed` once the client has
    /// been disconnected or the connection has failed.
    pub async fn send(&self, event: ClientEvent) -> ProtocolResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(ProtocolError::ConnectionClosed);
        }

        self.outbound_tx
            .send(event)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Whether the connection is still considered open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Connected realtime protocol client
///
/// # Example
/// ```no_run
/// use voxline::protocol::{ConnectionConfig, ProtocolEvent, RealtimeClient};
///
/// #[tokio::main]
/// async fn main() {
///     let config = ConnectionConfig::new();
///     let mut client = RealtimeClient::connect("api-key", &config).await.unwrap();
///
///     let token = client.subscribe(|event: &ProtocolEvent| {
///         println!("inbound: {:?}", event);
///     });
///
///     // ... use the client ...
///
///     client.unsubscribe(token);
///     client.disconnect().await;
/// }
/// ```
pub struct RealtimeClient {
    handle: ClientHandle,
    subscribers: Arc<Subscribers<ProtocolEvent>>,
    open: Arc<AtomicBool>,
    writer_stop: Option<oneshot::Sender<()>>,
    writer_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl RealtimeClient {
    /// Connect, authenticate and send the initial session configuration
    ///
    /// Resolves once the connection is open and the configuration event is
    /// queued; the service's `session.created` confirmation arrives later as
    /// an inbound event.
    ///
    /// # Errors
    /// Returns connection, authentication or timeout errors from the
    /// handshake.
    pub async fn connect(bearer_token: &str, config: &ConnectionConfig) -> ProtocolResult<Self> {
        let connection = RealtimeConnection::connect(bearer_token, config).await?;
        let (writer, reader) = connection.split();

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (writer_stop_tx, writer_stop_rx) = oneshot::channel();

        let open = Arc::new(AtomicBool::new(true));
        let error_reported = Arc::new(AtomicBool::new(false));
        let subscribers = Arc::new(Subscribers::new());

        let writer_handle = tokio::spawn(writer_task(
            writer,
            outbound_rx,
            writer_stop_rx,
            Arc::clone(&open),
            Arc::clone(&error_reported),
            Arc::clone(&subscribers),
        ));

        let reader_handle = tokio::spawn(reader_task(
            reader,
            Arc::clone(&open),
            Arc::clone(&error_reported),
            Arc::clone(&subscribers),
        ));

        let handle = ClientHandle {
            outbound_tx,
            open: Arc::clone(&open),
        };

        // Configure the session before anything else goes out
        handle.send(config.session_update()).await?;

        info!("Realtime client connected");

        Ok(Self {
            handle,
            subscribers,
            open,
            writer_stop: Some(writer_stop_tx),
            writer_task: Some(writer_handle),
            reader_task: Some(reader_handle),
        })
    }

    /// Queue an event for transmission
    ///
    /// # Errors
    /// Fails fast with `ProtocolError::ConnectionClosed` after disconnect.
    pub async fn send(&self, event: ClientEvent) -> ProtocolResult<()> {
        self.handle.send(event).await
    }

    /// A cloneable sending handle for background tasks
    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Register an inbound event handler
    ///
    /// Handlers run on the reader task, once per parsed event, in arrival
    /// order. The returned token revokes the subscription.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ProtocolEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.subscribers.add(handler)
    }

    /// Revoke a subscription
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.remove(token)
    }

    /// Whether the connection is still considered open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the connection and mark the client terminal
    ///
    /// Subsequent `send` calls fail fast. Deliberate disconnection does not
    /// emit a `ConnectionError`.
    pub async fn disconnect(&mut self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("Disconnecting realtime client");
        }

        if let Some(stop) = self.writer_stop.take() {
            let _ = stop.send(());
        }

        if let Some(task) = self.writer_task.take() {
            let _ = task.await;
        }

        if let Some(task) = self.reader_task.take() {
            // The reader normally ends once the close handshake completes;
            // don't wait forever on a dead peer
            let abort = task.abort_handle();
            if tokio::time::timeout(std::time::Duration::from_secs(2), task)
                .await
                .is_err()
            {
                warn!("Reader task did not finish in time, aborting");
                abort.abort();
            }
        }

        info!("Realtime client disconnected");
    }
}

/// Emit a `ConnectionError` at most once per connection attempt
///
/// Suppressed entirely after a deliberate disconnect.
fn report_connection_error(
    subscribers: &Subscribers<ProtocolEvent>,
    open: &AtomicBool,
    error_reported: &AtomicBool,
    message: String,
) {
    let was_open = open.swap(false, Ordering::AcqRel);
    if !was_open || error_reported.swap(true, Ordering::AcqRel) {
        return;
    }

    error!("Connection error: {}", message);
    subscribers.emit(&ProtocolEvent::ConnectionError { message });
}

/// Writer task: the single owner of the write half
///
/// Draining one channel guarantees outbound events hit the wire in the order
/// they were queued, whatever mixture of callers produced them.
async fn writer_task(
    mut writer: WsWriter,
    mut outbound_rx: mpsc::Receiver<ClientEvent>,
    mut stop_rx: oneshot::Receiver<()>,
    open: Arc<AtomicBool>,
    error_reported: Arc<AtomicBool>,
    subscribers: Arc<Subscribers<ProtocolEvent>>,
) {
    info!("Writer task started");
    let mut sent = 0u64;

    loop {
        tokio::select! {
            maybe_event = outbound_rx.recv() => {
                let Some(event) = maybe_event else {
                    break;
                };

                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize {}: {}", event.event_type(), e);
                        continue;
                    }
                };

                debug!("Sending {} ({} bytes)", event.event_type(), json.len());

                if let Err(e) = writer.send(Message::Text(json.into())).await {
                    report_connection_error(
                        &subscribers,
                        &open,
                        &error_reported,
                        format!("send failed: {}", e),
                    );
                    return;
                }
                sent += 1;
            }

            _ = &mut stop_rx => {
                break;
            }
        }
    }

    if let Err(e) = writer.close().await {
        debug!("Error closing writer: {}", e);
    }

    info!("Writer task completed: {} events sent", sent);
}

/// Reader task: parses inbound messages and dispatches them in order
async fn reader_task(
    mut reader: WsReader,
    open: Arc<AtomicBool>,
    error_reported: Arc<AtomicBool>,
    subscribers: Arc<Subscribers<ProtocolEvent>>,
) {
    info!("Reader task started");

    let mut received = 0u64;
    let mut consecutive_parse_failures = 0u32;

    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => match parse_server_event(&text) {
                Ok(event) => {
                    consecutive_parse_failures = 0;
                    received += 1;
                    debug!("Received {} (#{})", event.event_type(), received);
                    subscribers.emit(&ProtocolEvent::Event(event));
                }
                Err(e) => {
                    // A single malformed message is dropped; a run of them
                    // means we have lost framing with the peer
                    warn!("Dropping unparseable message: {}", e);
                    consecutive_parse_failures += 1;
                    if consecutive_parse_failures >= MAX_CONSECUTIVE_PARSE_FAILURES {
                        report_connection_error(
                            &subscribers,
                            &open,
                            &error_reported,
                            format!("protocol desync: {}", e),
                        );
                        return;
                    }
                }
            },
            Ok(Message::Close(frame)) => {
                info!("Received close frame: {:?}", frame);
                if open.load(Ordering::Acquire) {
                    report_connection_error(
                        &subscribers,
                        &open,
                        &error_reported,
                        "connection closed by server".to_string(),
                    );
                }
                return;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Pong replies are handled by the protocol stack
            }
            Ok(other) => {
                warn!("Ignoring unexpected message type: {:?}", other);
            }
            Err(e) => {
                if open.load(Ordering::Acquire) {
                    report_connection_error(
                        &subscribers,
                        &open,
                        &error_reported,
                        format!("transport error: {}", e),
                    );
                }
                return;
            }
        }
    }

    if open.load(Ordering::Acquire) {
        report_connection_error(
            &subscribers,
            &open,
            &error_reported,
            "connection ended unexpectedly".to_string(),
        );
    }

    info!("Reader task completed: {} events received", received);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_fails_fast_when_closed() {
        let (tx, _rx) = mpsc::channel(4);
        let handle = ClientHandle {
            outbound_tx: tx,
            open: Arc::new(AtomicBool::new(false)),
        };

        let result = handle.send(ClientEvent::InputAudioBufferCommit).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_commit_queued_strictly_after_appends() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let (tx, mut rx) = mpsc::channel(64);
        let handle = ClientHandle {
            outbound_tx: tx,
            open: Arc::new(AtomicBool::new(true)),
        };

        // 50 appends of 4096-byte frames, then one commit and one
        // response.create, as the router's stop_audio path produces
        let payload = STANDARD.encode([0u8; 4096]);
        let forwarder = {
            let handle = handle.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    handle
                        .send(ClientEvent::InputAudioBufferAppend {
                            audio: payload.clone(),
                        })
                        .await
                        .unwrap();
                }
            })
        };
        forwarder.await.unwrap();

        handle.send(ClientEvent::InputAudioBufferCommit).await.unwrap();
        handle
            .send(ClientEvent::ResponseCreate { response: None })
            .await
            .unwrap();
        drop(handle);

        // All 50 appends drain strictly before the commit, which precedes
        // the response.create; nothing follows
        let mut appends = 0;
        loop {
            match rx.recv().await.unwrap() {
                ClientEvent::InputAudioBufferAppend { audio } => {
                    assert_eq!(audio, payload);
                    appends += 1;
                }
                ClientEvent::InputAudioBufferCommit => break,
                other => panic!("Expected append or commit, got {:?}", other.event_type()),
            }
        }
        assert_eq!(appends, 50);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::ResponseCreate { .. }
        ));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_connection_error_reported_once() {
        let subscribers: Subscribers<ProtocolEvent> = Subscribers::new();
        let open = AtomicBool::new(true);
        let reported = AtomicBool::new(false);

        let count = Arc::new(std::sync::Mutex::new(0usize));
        let count_clone = Arc::clone(&count);
        subscribers.add(move |event: &ProtocolEvent| {
            if matches!(event, ProtocolEvent::ConnectionError { .. }) {
                *count_clone.lock().unwrap() += 1;
            }
        });

        report_connection_error(&subscribers, &open, &reported, "first".to_string());
        report_connection_error(&subscribers, &open, &reported, "second".to_string());

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(!open.load(Ordering::Acquire));
    }

    #[test]
    fn test_connection_error_suppressed_after_deliberate_close() {
        let subscribers: Subscribers<ProtocolEvent> = Subscribers::new();
        // Deliberate disconnect already flipped the flag
        let open = AtomicBool::new(false);
        let reported = AtomicBool::new(false);

        let count = Arc::new(std::sync::Mutex::new(0usize));
        let count_clone = Arc::clone(&count);
        subscribers.add(move |event: &ProtocolEvent| {
            if matches!(event, ProtocolEvent::ConnectionError { .. }) {
                *count_clone.lock().unwrap() += 1;
            }
        });

        report_connection_error(&subscribers, &open, &reported, "late".to_string());
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
