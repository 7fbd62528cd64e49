//! The bounded command queue.
//!
//! Producers (the MQTT event thread) enqueue without blocking and fail fast
//! when the queue is full — backpressure against a command flood.  The single
//! consumer (the dispatcher worker) blocks with a timeout.

use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::{info, warn};

use crate::app::ports::Clock;

use super::parse::{bounded_payload, CommandKind};

/// Fixed queue capacity.  The eleventh concurrent enqueue attempt fails.
pub const COMMAND_QUEUE_CAPACITY: usize = 10;

/// One accepted command, waiting for the worker.
#[derive(Debug, Clone)]
pub struct CommandMessage {
    pub kind: CommandKind,
    /// Bounded payload text; empty for most commands.
    pub payload: String,
    /// Seconds-since-boot at enqueue time.
    pub received_at: u64,
}

/// Enqueue rejection, surfaced to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity — notify the requester, do not retry here.
    Full,
    /// The worker has shut down.
    Closed,
}

impl core::fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "command queue full"),
            Self::Closed => write!(f, "command worker not running"),
        }
    }
}

/// Create the bounded queue.
pub fn command_queue() -> (Sender<CommandMessage>, Receiver<CommandMessage>) {
    bounded(COMMAND_QUEUE_CAPACITY)
}

/// Producer-side handle, cheap to clone into transport callbacks.
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<CommandMessage>,
    clock: Arc<dyn Clock>,
}

impl CommandSender {
    pub fn new(tx: Sender<CommandMessage>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, clock }
    }

    /// Non-blocking append.  Stamps the receipt time and bounds the payload.
    pub fn enqueue(&self, kind: CommandKind, payload: &str) -> Result<(), EnqueueError> {
        let message = CommandMessage {
            kind,
            payload: bounded_payload(payload),
            received_at: self.clock.now_secs(),
        };
        match self.tx.try_send(message) {
            Ok(()) => {
                info!("queued {kind:?}");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!("command queue full, rejecting {kind:?}");
                Err(EnqueueError::Full)
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("command queue closed, rejecting {kind:?}");
                Err(EnqueueError::Closed)
            }
        }
    }
}
