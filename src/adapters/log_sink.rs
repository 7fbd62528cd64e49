//! Log-based notification adapter.
//!
//! Implements [`Notifier`] by writing every notice to the logger (UART /
//! USB-CDC in production).  Used as the fallback publisher when MQTT is
//! unavailable, and handy during bring-up.

use log::info;

use crate::app::ports::Notifier;

/// Adapter that logs every notice to the serial console.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn publish(&self, topic: &str, message: &str) {
        info!("NOTIFY {topic} | {message}");
    }
}
