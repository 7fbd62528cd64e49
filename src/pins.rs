//! GPIO / peripheral pin assignments for the Soilwarden board
//! (ESP32-C3 Super Mini carrier).
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Digital output driving the watering pump relay (active HIGH).
pub const PUMP_GPIO: i32 = 6;

/// On-board status LED.  The C3 Super Mini routes this LED to 3V3, so the
/// logic is inverted: LOW = lit, HIGH = dark.
pub const STATUS_LED_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1)
// ---------------------------------------------------------------------------

/// Capacitive soil-moisture probe — analog voltage on ADC1 channel 0 (GPIO 0).
pub const SOIL_ADC_GPIO: i32 = 0;
