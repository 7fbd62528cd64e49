//! Soil-moisture probe adapter.
//!
//! The conversion arithmetic (multi-sample average, linear calibration
//! between the air/water endpoints, 0–100 % clamp) is pure and unit-tested
//! on the host.  The ADC acquisition itself lives behind
//! `target_os = "espidf"`.

use std::sync::{Arc, Mutex, PoisonError};

use crate::app::ports::{ReadingSource, SoilReading};

/// 12-bit ADC full scale.
const ADC_FULL_SCALE: f32 = 4095.0;
/// Probe supply rail in volts.
const ADC_REFERENCE_V: f32 = 3.3;

/// Linear voltage approximation for an uncalibrated raw reading.
pub fn raw_to_voltage(raw: u16) -> f32 {
    f32::from(raw) * ADC_REFERENCE_V / ADC_FULL_SCALE
}

/// Calibrated moisture percentage, clamped to 0–100.
///
/// `air` is the raw reading of the probe in dry air, `water` fully
/// submerged; capacitive probes read *lower* when wet.
pub fn moisture_percent(raw: u16, air: u16, water: u16) -> f32 {
    if air <= water {
        return 0.0;
    }
    let pct = f32::from(air.saturating_sub(raw.min(air))) * 100.0 / f32::from(air - water);
    pct.clamp(0.0, 100.0)
}

/// Shared cell holding the most recent reading.  The sensor loop stores
/// into it; `GET_READING` and telemetry read from it.
#[derive(Clone, Default)]
pub struct LatestReading {
    cell: Arc<Mutex<Option<SoilReading>>>,
}

impl LatestReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, reading: SoilReading) {
        *self
            .cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reading);
    }
}

impl ReadingSource for LatestReading {
    fn latest(&self) -> Option<SoilReading> {
        *self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── ESP-IDF ADC acquisition ───────────────────────────────────

#[cfg(target_os = "espidf")]
pub use espidf::SoilProbe;

#[cfg(target_os = "espidf")]
mod espidf {
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::adc::attenuation::DB_11;
    use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
    use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
    use esp_idf_hal::adc::ADC1;
    use esp_idf_hal::gpio::Gpio0;
    use log::warn;

    use super::{moisture_percent, raw_to_voltage};
    use crate::app::ports::SoilReading;
    use crate::config::SystemConfig;

    /// Pause between averaged samples to let the ADC settle.
    const SAMPLE_SETTLE: Duration = Duration::from_millis(10);

    /// Capacitive soil probe on ADC1 channel 0 (GPIO 0).  The channel
    /// driver owns the ADC unit.
    pub struct SoilProbe<'d> {
        channel: AdcChannelDriver<'d, Gpio0, AdcDriver<'d, ADC1>>,
        air_raw: u16,
        water_raw: u16,
        samples: u8,
    }

    impl<'d> SoilProbe<'d> {
        pub fn new(
            channel: AdcChannelDriver<'d, Gpio0, AdcDriver<'d, ADC1>>,
            cfg: &SystemConfig,
        ) -> Self {
            Self {
                channel,
                air_raw: cfg.moisture_air_raw,
                water_raw: cfg.moisture_water_raw,
                samples: cfg.moisture_samples.max(1),
            }
        }

        pub fn channel_config() -> AdcChannelConfig {
            AdcChannelConfig {
                attenuation: DB_11,
                calibration: true,
                ..Default::default()
            }
        }

        /// Averaged, calibrated reading.  `now` is seconds-since-boot.
        pub fn read(&mut self, now: u64) -> Option<SoilReading> {
            let mut sum: u32 = 0;
            let mut taken: u32 = 0;
            for _ in 0..self.samples {
                match self.channel.read() {
                    Ok(raw) => {
                        sum += u32::from(raw);
                        taken += 1;
                    }
                    Err(e) => warn!("soil ADC read failed: {e}"),
                }
                thread::sleep(SAMPLE_SETTLE);
            }
            if taken == 0 {
                return None;
            }
            let raw = (sum / taken) as u16;
            Some(SoilReading {
                raw_adc: raw,
                voltage: raw_to_voltage(raw),
                moisture_pct: moisture_percent(raw, self.air_raw, self.water_raw),
                taken_at: now,
            })
        }
    }
}
