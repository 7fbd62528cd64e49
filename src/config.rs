//! System configuration parameters
//!
//! All tunable parameters for the Soilwarden system.  The defaults mirror the
//! shipped field configuration; deployments override individual values via
//! the provisioning tooling before flashing.

use serde::{Deserialize, Serialize};

/// MQTT topic set.  Inbound commands arrive on `command`; everything else is
/// published by the firmware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttTopics {
    /// Periodic sensor snapshots (JSON).
    pub data: String,
    /// Inbound remote commands (plain text).
    pub command: String,
    /// Periodic system status (JSON).
    pub status: String,
    /// Command responses (plain text).
    pub response: String,
    /// Firmware update notices and progress (plain text).
    pub ota_status: String,
}

impl Default for MqttTopics {
    fn default() -> Self {
        Self {
            data: "soilwarden/esp/data".into(),
            command: "soilwarden/esp/command".into(),
            status: "soilwarden/esp/status".into(),
            response: "soilwarden/esp/response".into(),
            ota_status: "soilwarden/esp/ota_status".into(),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Network ---
    /// WiFi SSID (station mode).
    pub wifi_ssid: String,
    /// WiFi passphrase.
    pub wifi_password: String,
    /// MQTT broker URI.
    pub mqtt_broker: String,
    /// MQTT client id — must be unique per broker.
    pub mqtt_client_id: String,
    /// Topic set.
    pub topics: MqttTopics,

    // --- Watering ---
    /// How long the pump runs per WATER command (milliseconds).
    pub watering_duration_ms: u32,

    // --- Command worker ---
    /// Receive timeout of the command worker's queue wait (milliseconds).
    pub command_poll_interval_ms: u32,

    // --- Firmware update ---
    /// Per-operation timeout of the firmware fetch (milliseconds).
    pub ota_timeout_ms: u32,
    /// Download chunk size (bytes).
    pub ota_chunk_bytes: u32,
    /// Delay between the final update notice and the reboot (milliseconds).
    pub ota_reboot_grace_ms: u32,
    /// Reboot into the new image automatically after a successful update.
    pub ota_auto_reboot: bool,

    // --- Telemetry cadence ---
    /// Sensor snapshot publish interval (seconds).
    pub sensor_publish_interval_secs: u32,
    /// System status publish interval (seconds).
    pub status_publish_interval_secs: u32,

    // --- Moisture probe calibration ---
    /// Raw ADC reading of the probe in dry air.
    pub moisture_air_raw: u16,
    /// Raw ADC reading of the probe fully submerged.
    pub moisture_water_raw: u16,
    /// Samples averaged per reading.
    pub moisture_samples: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Network — placeholders, overridden at provisioning time
            wifi_ssid: "soilwarden".into(),
            wifi_password: String::new(),
            mqtt_broker: "mqtt://test.mosquitto.org:1883".into(),
            mqtt_client_id: "soilwarden_esp32c3".into(),
            topics: MqttTopics::default(),

            // Watering
            watering_duration_ms: 1500,

            // Command worker
            command_poll_interval_ms: 1000,

            // Firmware update
            ota_timeout_ms: 30_000,
            ota_chunk_bytes: 1024,
            ota_reboot_grace_ms: 3000,
            ota_auto_reboot: true,

            // Telemetry cadence
            sensor_publish_interval_secs: 2,
            status_publish_interval_secs: 30,

            // Moisture calibration (12-bit ADC)
            moisture_air_raw: 3000,
            moisture_water_raw: 1400,
            moisture_samples: 10,
        }
    }
}
