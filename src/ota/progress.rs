//! Progress event channel.
//!
//! The download worker reports `(percentage, state, message)` through a
//! bounded channel rather than a callback, so a slow subscriber can never
//! re-enter or stall the worker.  Whoever holds the receiver decides what to
//! do with the events — the target main publishes them over MQTT, tests
//! drain and assert on them.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::debug;

use super::UpdateState;

/// Depth of the progress channel.  A full decade sweep plus the terminal
/// events fits comfortably.
pub const PROGRESS_CHANNEL_DEPTH: usize = 16;

/// One progress report from the download worker.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Download percentage, 0–100.
    pub percentage: u8,
    /// Engine state at the time of the report.
    pub state: UpdateState,
    /// Short human-readable description.
    pub message: String,
}

/// Create the bounded progress channel.
pub fn progress_channel() -> (ProgressSender, Receiver<ProgressEvent>) {
    let (tx, rx) = bounded(PROGRESS_CHANNEL_DEPTH);
    (ProgressSender { tx }, rx)
}

/// Worker-side handle.  Sends never block: when the channel is full the
/// event is dropped, which only costs a subscriber one coarse report.
#[derive(Clone)]
pub struct ProgressSender {
    tx: Sender<ProgressEvent>,
}

impl ProgressSender {
    pub fn emit(&self, percentage: u8, state: UpdateState, message: impl Into<String>) {
        let event = ProgressEvent {
            percentage,
            state,
            message: message.into(),
        };
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("progress channel full, dropping {}% report", event.percentage);
            }
            Err(TrySendError::Disconnected(_)) => {
                // No subscriber; progress is only observable via getProgress().
            }
        }
    }
}
