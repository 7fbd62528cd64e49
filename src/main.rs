//! Soilwarden firmware — main entry point.
//!
//! Hexagonal wiring around two workers and the main-thread telemetry loop:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  MqttNotifier    HttpFetchClient   EspOtaStorage   SoilProbe │
//! │  (Notifier+sub)  (FetchClient)     (FirmwareStorage) (ADC)   │
//! │  WateringHardware   UptimeClock    DeviceSystem              │
//! │  (ActuatorPort)     (Clock)        (SystemControl)           │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ────────────────        │
//! │                                                              │
//! │  MQTT rx ─▶ parse ─▶ bounded queue ─▶ command worker         │
//! │                                        │                     │
//! │                                        ▼                     │
//! │                                  UpdateEngine ─▶ ota worker  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use soilwarden::adapters::hardware::WateringHardware;
use soilwarden::adapters::http::HttpFetchClient;
use soilwarden::adapters::log_sink::LogNotifier;
use soilwarden::adapters::moisture::{LatestReading, SoilProbe};
use soilwarden::adapters::ota_flash::{self, EspOtaStorage};
use soilwarden::adapters::system::DeviceSystem;
use soilwarden::adapters::time::UptimeClock;
use soilwarden::adapters::{mqtt, wifi};
use soilwarden::app::ports::{Clock, Notifier};
use soilwarden::command::{command_queue, CommandSender, Dispatcher, DispatcherConfig};
use soilwarden::config::SystemConfig;
use soilwarden::drivers::task;
use soilwarden::pins;
use soilwarden::ota::{progress_channel, EngineDeps, UpdateConfig, UpdateEngine};
use soilwarden::telemetry;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Soilwarden v{} starting", env!("CARGO_PKG_VERSION"));

    // Cancel the rollback watchdog before anything else can fail the boot.
    ota_flash::mark_boot_valid();

    let config = SystemConfig::default();

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── 2. Actuators and soil probe ───────────────────────────
    info!(
        "pins: pump=GPIO{} led=GPIO{} soil=GPIO{}",
        pins::PUMP_GPIO,
        pins::STATUS_LED_GPIO,
        pins::SOIL_ADC_GPIO
    );
    let pump_pin = PinDriver::output(peripherals.pins.gpio6)?;
    let led_pin = PinDriver::output(peripherals.pins.gpio8)?;
    let mut hardware = WateringHardware::new(pump_pin, led_pin);
    hardware.blink_indicator(3, Duration::from_millis(100));

    let adc = AdcDriver::new(peripherals.adc1)?;
    let channel =
        AdcChannelDriver::new(adc, peripherals.pins.gpio0, &SoilProbe::channel_config())?;
    let mut probe = SoilProbe::new(channel, &config);

    let clock: Arc<dyn Clock> = Arc::new(UptimeClock::new());
    let latest = LatestReading::new();

    // ── 3. Network ────────────────────────────────────────────
    let _wifi = wifi::connect(
        peripherals.modem,
        sys_loop,
        nvs,
        &config.wifi_ssid,
        &config.wifi_password,
    )?;

    let (queue_tx, queue_rx) = command_queue();
    let sender = CommandSender::new(queue_tx, Arc::clone(&clock));
    let notifier: Arc<dyn Notifier> = match mqtt::start(&config, sender) {
        Ok(notifier) => notifier,
        Err(e) => {
            warn!("mqtt unavailable ({e}), notices go to the log only");
            Arc::new(LogNotifier::new())
        }
    };

    // ── 4. Update engine + progress drain ─────────────────────
    let (progress_tx, progress_rx) = progress_channel();
    let engine = Arc::new(UpdateEngine::new(
        EngineDeps {
            storage: Arc::new(EspOtaStorage::new()),
            fetch: Arc::new(HttpFetchClient::new()),
            notifier: Arc::clone(&notifier),
            clock: Arc::clone(&clock),
            system: Arc::new(DeviceSystem::new()),
        },
        UpdateConfig::from_system(&config),
        progress_tx,
    ));
    {
        let notifier = Arc::clone(&notifier);
        let topic = config.topics.ota_status.clone();
        task::spawn_worker(2, 4, "ota-prog\0", move || {
            for event in progress_rx {
                notifier.publish(
                    &topic,
                    &format!(
                        "[{}] {} ({}%)",
                        event.state.label(),
                        event.message,
                        event.percentage
                    ),
                );
            }
        });
    }

    // ── 5. Command worker ─────────────────────────────────────
    let dispatcher = Dispatcher::new(
        queue_rx,
        Arc::clone(&engine),
        Box::new(hardware),
        Arc::new(latest.clone()),
        Arc::clone(&notifier),
        DispatcherConfig::from_system(&config),
    );
    let command_stats = dispatcher.stats();
    let _command_worker = dispatcher.spawn();

    info!("system ready, monitoring soil moisture");

    // ── 6. Telemetry loop (main thread) ───────────────────────
    let sensor_every = u64::from(config.sensor_publish_interval_secs);
    let status_every = u64::from(config.status_publish_interval_secs);
    let mut last_data: u64 = 0;
    let mut last_status: u64 = 0;

    loop {
        let now = clock.now_secs();

        if now.saturating_sub(last_data) >= sensor_every {
            if let Some(reading) = probe.read(now) {
                latest.store(reading);
                let pump_on = command_stats.snapshot().pump_active;
                notifier.publish(&config.topics.data, &telemetry::sensor_json(&reading, pump_on));
            }
            last_data = now;
        }

        if now.saturating_sub(last_status) >= status_every {
            let free_heap = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() };
            notifier.publish(
                &config.topics.status,
                &telemetry::status_json(
                    now,
                    free_heap,
                    engine.current_version().as_str(),
                    &command_stats.snapshot(),
                    engine.state(),
                    &engine.statistics(),
                ),
            );
            last_status = now;
        }

        std::thread::sleep(Duration::from_millis(500));
    }
}
