//! Telemetry payload composition.
//!
//! The JSON shapes are a wire contract with the companion gateway — field
//! names stay put even when the internals move.

use serde::Serialize;

use crate::app::ports::SoilReading;
use crate::command::CommandStatsSnapshot;
use crate::ota::{Statistics, UpdateState};

#[derive(Serialize)]
struct SensorReport<'a> {
    timestamp: u64,
    voltage: f32,
    moisture: f32,
    raw_adc: u16,
    gpio_status: bool,
    r#type: &'a str,
}

/// Periodic soil snapshot for the data topic.
pub fn sensor_json(reading: &SoilReading, pump_on: bool) -> String {
    serde_json::to_string(&SensorReport {
        timestamp: reading.taken_at,
        voltage: reading.voltage,
        moisture: reading.moisture_pct,
        raw_adc: reading.raw_adc,
        gpio_status: pump_on,
        r#type: "soil_data",
    })
    .unwrap_or_default()
}

#[derive(Serialize)]
struct StatusReport<'a> {
    timestamp: u64,
    system: &'a str,
    uptime: u64,
    free_heap: u32,
    gpio_status: bool,
    commands_processed: u32,
    command_errors: u32,
    water_count: u32,
    firmware_version: &'a str,
    ota_attempted: u32,
    ota_succeeded: u32,
    ota_state: &'a str,
    r#type: &'a str,
}

/// Periodic system status for the status topic.
pub fn status_json(
    now: u64,
    free_heap: u32,
    firmware_version: &str,
    commands: &CommandStatsSnapshot,
    ota_state: UpdateState,
    ota: &Statistics,
) -> String {
    serde_json::to_string(&StatusReport {
        timestamp: now,
        system: "online",
        uptime: now,
        free_heap,
        gpio_status: commands.pump_active,
        commands_processed: commands.processed,
        command_errors: commands.errors,
        water_count: commands.waterings,
        firmware_version,
        ota_attempted: ota.attempted,
        ota_succeeded: ota.succeeded,
        ota_state: ota_state.label(),
        r#type: "system_status",
    })
    .unwrap_or_default()
}
