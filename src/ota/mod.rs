//! Over-the-air firmware update engine.
//!
//! [`UpdateEngine`] owns the update state machine and drives the
//! download → verify → install protocol on a dedicated worker thread, so
//! status queries and cancellation stay responsive while a multi-second
//! download proceeds.  All I/O goes through the port traits in
//! [`crate::app::ports`].

mod engine;
pub mod image;
mod progress;
mod state;

pub use engine::{EngineDeps, UpdateConfig, UpdateEngine, UpdateError, UpdateRequest};
pub use progress::{progress_channel, ProgressEvent, ProgressSender, PROGRESS_CHANNEL_DEPTH};
pub use state::{FailureKind, FirmwareVersion, Statistics, UpdateOutcome, UpdateState};
