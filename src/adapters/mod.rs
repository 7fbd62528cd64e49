//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements       | Connects to                  |
//! |-------------|------------------|------------------------------|
//! | `hardware`  | ActuatorPort     | Pump relay + status LED GPIO |
//! | `http`      | FetchClient      | ESP-IDF HTTP client          |
//! | `log_sink`  | Notifier         | Serial log output            |
//! | `moisture`  | ReadingSource    | ESP32 ADC1 soil probe        |
//! | `mqtt`      | Notifier         | MQTT broker (pub + sub)      |
//! | `ota_flash` | FirmwareStorage  | esp-ota partition API        |
//! | `system`    | SystemControl    | esp_restart                  |
//! | `time`      | Clock            | ESP32 system timer           |
//! | `wifi`      | —                | ESP-IDF WiFi STA bring-up    |

pub mod hardware;
pub mod log_sink;
pub mod moisture;
pub mod system;
pub mod time;

#[cfg(target_os = "espidf")]
pub mod http;
#[cfg(target_os = "espidf")]
pub mod mqtt;
#[cfg(target_os = "espidf")]
pub mod ota_flash;
#[cfg(target_os = "espidf")]
pub mod wifi;
