//! Remote command handling.
//!
//! Transport callbacks [`parse`] inbound text and [`enqueue`](CommandSender)
//! it onto a bounded FIFO; a single worker thread executes the commands
//! strictly in order, delegating the OTA commands to the
//! [`UpdateEngine`](crate::ota::UpdateEngine).

mod dispatcher;
mod parse;
mod queue;

pub use dispatcher::{
    CommandStats, CommandStatsSnapshot, DispatchError, Dispatcher, DispatcherConfig,
    DispatcherHandle,
};
pub use parse::{bounded_payload, parse, split_command, CommandKind, MAX_PAYLOAD_BYTES};
pub use queue::{
    command_queue, CommandMessage, CommandSender, EnqueueError, COMMAND_QUEUE_CAPACITY,
};
