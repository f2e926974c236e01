/// Session orchestration
///
/// The session router ties the capture pipeline, playback pipeline and
/// protocol client together: it drives the session state machine from
/// inbound events and exposes the external operation surface.

/// Streamed text delta accumulation
pub mod accumulator;

/// Router notifications and status snapshot
pub mod events;

/// The session router
pub mod router;

/// Session state machine
pub mod state;

// Re-export commonly used types
pub use accumulator::ResponseAccumulator;
pub use events::{RouterEvent, RouterStatus};
pub use router::{RouterConfig, SessionRouter};
pub use state::{SessionState, StateError, StateManager, StateResult};
