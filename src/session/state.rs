use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Session lifecycle state
///
/// `Idle -> Connecting -> Connected -> {Listening, Responding} -> Idle`,
/// plus `Error` reachable from any state on fatal failure. An errored
/// session recovers only through an explicit `disconnect` and `connect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionState {
    /// No session; waiting for connect
    Idle,

    /// Connection handshake in progress
    Connecting,

    /// Session established, no activity in flight
    Connected,

    /// Microphone frames are streaming to the service
    Listening,

    /// A response is streaming back
    Responding,

    /// Fatal failure; requires explicit disconnect/connect to recover
    Error(String),
}

impl SessionState {
    /// Check if idle
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if connecting
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Check if connected (including listening/responding)
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Listening | Self::Responding)
    }

    /// Check if listening
    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening)
    }

    /// Check if a response is in flight
    pub fn is_responding(&self) -> bool {
        matches!(self, Self::Responding)
    }

    /// Check if in the error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The error message, when in the error state
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// State name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Listening => "Listening",
            Self::Responding => "Responding",
            Self::Error(_) => "Error",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// State-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// A transition the state machine does not allow
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// An operation invoked in a state that does not support it
    #[error("Operation '{operation}' is not valid in state {state:?}")]
    InvalidOperation {
        operation: &'static str,
        state: SessionState,
    },
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

/// Session state manager
///
/// Holds the current state behind an `ArcSwap` for lock-free reads and
/// pushes every change to registered listeners, so collaborators are
/// notified on each transition instead of polling.
///
/// # Examples
///
/// ```
/// use voxline::session::state::{SessionState, StateManager};
///
/// let manager = StateManager::new();
/// assert!(manager.current().is_idle());
///
/// assert!(manager.transition(SessionState::Connecting).is_ok());
/// assert!(manager.transition(SessionState::Responding).is_err());
/// ```
pub struct StateManager {
    /// Current state (lock-free reads)
    state: ArcSwap<SessionState>,

    /// State change listeners
    listeners: std::sync::Mutex<Vec<mpsc::Sender<SessionState>>>,
}

impl StateManager {
    /// Create a manager in the idle state
    pub fn new() -> Self {
        Self {
            state: ArcSwap::new(Arc::new(SessionState::Idle)),
            listeners: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get the current state
    pub fn current(&self) -> Arc<SessionState> {
        self.state.load_full()
    }

    /// Transition to a new state
    ///
    /// Validates the transition against the state machine and notifies
    /// listeners on success.
    ///
    /// # Errors
    /// Returns [`StateError::InvalidTransition`] for a disallowed move.
    pub fn transition(&self, new_state: SessionState) -> StateResult<()> {
        let current = self.current();

        if !Self::is_valid_transition(&current, &new_state) {
            return Err(StateError::InvalidTransition {
                from: (*current).clone(),
                to: new_state,
            });
        }

        self.state.store(Arc::new(new_state.clone()));
        self.notify_listeners(new_state);

        Ok(())
    }

    /// Register a state change listener
    ///
    /// The receiver sees every subsequent state change. Closed listeners are
    /// pruned on the next notification.
    pub fn subscribe(&self) -> mpsc::Receiver<SessionState> {
        let (tx, rx) = mpsc::channel(32);
        self.listeners.lock().unwrap().push(tx);
        rx
    }

    /// Force a state without validation
    ///
    /// Used for error recovery paths (disconnect from any state).
    pub fn force_set(&self, new_state: SessionState) {
        self.state.store(Arc::new(new_state.clone()));
        self.notify_listeners(new_state);
    }

    /// Reset to idle, skipping validation
    pub fn reset(&self) {
        self.force_set(SessionState::Idle);
    }

    /// Notify all listeners, dropping the ones that have gone away
    fn notify_listeners(&self, new_state: SessionState) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|tx| tx.try_send(new_state.clone()).is_ok() || !tx.is_closed());
    }

    /// Validate a transition against the state machine
    fn is_valid_transition(from: &SessionState, to: &SessionState) -> bool {
        use SessionState::*;

        match (from, to) {
            (Idle, Connecting) => true,

            (Connecting, Connected) => true,

            (Connected, Listening) => true,
            (Connected, Responding) => true,

            (Listening, Responding) => true,
            (Listening, Connected) => true,

            (Responding, Connected) => true,

            // Disconnect returns to idle from anywhere
            (_, Idle) => true,

            // Fatal failures are reachable from any state
            (_, Error(_)) => true,

            _ => false,
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
