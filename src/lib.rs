//! Voxline - realtime duplex voice client for conversational AI
//!
//! Streams live microphone audio and text to a conversational AI service
//! over a persistent WebSocket connection and plays back the streamed
//! audio/text response with minimal latency.
//!
//! The crate is organized as four layers, leaves first:
//!
//! - [`audio`]: capture pipeline (microphone to normalized 24 kHz PCM16
//!   frames) and playback pipeline (streamed PCM16 chunks to gapless
//!   output)
//! - [`protocol`]: the persistent connection, typed wire events, and the
//!   client with its single-writer/single-reader task discipline
//! - [`session`]: the router that drives the session state machine and
//!   exposes connect/disconnect/send_text/start_audio/stop_audio/interrupt
//! - [`utils`]: aggregate errors, logging setup, subscriptions
//!
//! # Example
//!
//! ```no_run
//! use voxline::credentials::EnvCredentials;
//! use voxline::session::{RouterConfig, RouterEvent, SessionRouter};
//!
//! #[tokio::main]
//! async fn main() {
//!     voxline::utils::logging::init_logging();
//!
//!     let mut router = SessionRouter::new(RouterConfig::default());
//!     let _token = router.subscribe(|event: &RouterEvent| match event {
//!         RouterEvent::TextDelta { text, .. } => println!("\r{}", text),
//!         RouterEvent::Error { kind, message } => eprintln!("{:?}: {}", kind, message),
//!         _ => {}
//!     });
//!
//!     router.connect(&EnvCredentials::new()).await.unwrap();
//!     router.start_audio().await.unwrap();
//!     // ... speak ...
//!     router.stop_audio().await.unwrap();
//! }
//! ```

/// Audio capture and playback
pub mod audio;

/// Credential provider seam
pub mod credentials;

/// Realtime wire protocol
pub mod protocol;

/// Session orchestration
pub mod session;

/// Shared utilities
pub mod utils;

// Re-export the top-level surface
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use session::{RouterConfig, RouterEvent, RouterStatus, SessionRouter, SessionState};
pub use utils::error::{AppError, AppResult, ErrorKind};
