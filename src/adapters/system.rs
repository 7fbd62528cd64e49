//! Device reset adapter.
//!
//! On ESP-IDF the restart call never returns.  The host variant records the
//! request and returns, so tests can drive the auto-reboot path without
//! killing the test process.

use log::warn;

use crate::app::ports::SystemControl;

pub struct DeviceSystem;

impl DeviceSystem {
    pub fn new() -> Self {
        Self
    }
}

impl SystemControl for DeviceSystem {
    #[cfg(target_os = "espidf")]
    fn restart(&self) {
        warn!("restarting device");
        esp_ota::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&self) {
        warn!("restart requested (simulation — no hardware reset)");
    }
}
