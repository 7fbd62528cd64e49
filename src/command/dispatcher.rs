//! The single-consumer command worker.
//!
//! Exactly one thread drains the queue, so no two commands ever execute
//! concurrently and the actuator has a single owner.  `WATER` deliberately
//! blocks the worker for the watering interval; everything else returns
//! quickly, and the long-running OTA download happens on the update engine's
//! own worker so `OTA_STATUS`/`OTA_CANCEL` stay responsive.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};

use crate::app::ports::{ActuatorPort, Notifier, ReadingSource};
use crate::config::SystemConfig;
use crate::drivers::task;
use crate::ota::{UpdateEngine, UpdateError, UpdateRequest};

use super::parse::CommandKind;
use super::queue::CommandMessage;

/// Command worker thread parameters.
const WORKER_PRIORITY: u8 = 4;
const WORKER_STACK_KB: usize = 6;

// ── Errors ────────────────────────────────────────────────────

/// Why a command execution counted as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// `OTA_UPDATE` arrived without a firmware URL.
    MissingLocator,
    /// The update engine rejected the delegated operation.
    Update(UpdateError),
    /// Unrecognized command text.
    Unrecognized,
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingLocator => write!(f, "firmware URL missing"),
            Self::Update(e) => write!(f, "{e}"),
            Self::Unrecognized => write!(f, "unrecognized command"),
        }
    }
}

impl From<UpdateError> for DispatchError {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

// ── Statistics ────────────────────────────────────────────────

/// Worker counters, shared with status snapshots and telemetry.
#[derive(Default)]
pub struct CommandStats {
    processed: AtomicU32,
    errors: AtomicU32,
    waterings: AtomicU32,
    pump_active: AtomicBool,
}

/// Plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatsSnapshot {
    pub processed: u32,
    pub errors: u32,
    pub waterings: u32,
    pub pump_active: bool,
}

impl CommandStats {
    pub fn snapshot(&self) -> CommandStatsSnapshot {
        CommandStatsSnapshot {
            processed: self.processed.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            waterings: self.waterings.load(Ordering::SeqCst),
            pump_active: self.pump_active.load(Ordering::SeqCst),
        }
    }
}

// ── Configuration ─────────────────────────────────────────────

/// Dispatcher tuning, derived from [`SystemConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Pump run time per `WATER` command.
    pub watering_duration: Duration,
    /// Queue receive timeout of the worker loop.
    pub poll_interval: Duration,
    /// Topic for command responses.
    pub response_topic: String,
    /// Fetch timeout handed to the update engine.
    pub ota_timeout: Duration,
    /// Auto-reboot policy handed to the update engine.
    pub ota_auto_reboot: bool,
}

impl DispatcherConfig {
    pub fn from_system(cfg: &SystemConfig) -> Self {
        Self {
            watering_duration: Duration::from_millis(u64::from(cfg.watering_duration_ms)),
            poll_interval: Duration::from_millis(u64::from(cfg.command_poll_interval_ms)),
            response_topic: cfg.topics.response.clone(),
            ota_timeout: Duration::from_millis(u64::from(cfg.ota_timeout_ms)),
            ota_auto_reboot: cfg.ota_auto_reboot,
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────

/// Handle to a spawned worker.  `stop()` asks the loop to exit at its next
/// wakeup and joins it.
pub struct DispatcherHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The command worker.  Owns the consumer end of the queue and the actuator.
pub struct Dispatcher {
    rx: Receiver<CommandMessage>,
    engine: Arc<UpdateEngine>,
    actuator: Box<dyn ActuatorPort>,
    readings: Arc<dyn ReadingSource>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<CommandStats>,
    config: DispatcherConfig,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        rx: Receiver<CommandMessage>,
        engine: Arc<UpdateEngine>,
        actuator: Box<dyn ActuatorPort>,
        readings: Arc<dyn ReadingSource>,
        notifier: Arc<dyn Notifier>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            rx,
            engine,
            actuator,
            readings,
            notifier,
            stats: Arc::new(CommandStats::default()),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared counters — grab a clone before [`spawn`](Self::spawn).
    pub fn stats(&self) -> Arc<CommandStats> {
        Arc::clone(&self.stats)
    }

    /// Move the dispatcher onto its worker thread.
    pub fn spawn(self) -> DispatcherHandle {
        let shutdown = Arc::clone(&self.shutdown);
        let thread = task::spawn_worker(WORKER_PRIORITY, WORKER_STACK_KB, "cmd-exec\0", move || {
            self.run();
        });
        DispatcherHandle {
            shutdown,
            thread: Some(thread),
        }
    }

    /// The worker loop.  Waits up to the poll interval per receive; an empty
    /// wakeup is the hook for periodic housekeeping (none needed today).
    pub fn run(mut self) {
        info!("command worker started");
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.rx.recv_timeout(self.config.poll_interval) {
                Ok(message) => {
                    debug!(
                        "executing {:?} (received at {} s)",
                        message.kind, message.received_at
                    );
                    match self.execute(&message) {
                        Ok(()) => {
                            self.stats.processed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            warn!("{:?} failed: {e}", message.kind);
                            self.stats.errors.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("command worker stopped");
    }

    fn execute(&mut self, message: &CommandMessage) -> Result<(), DispatchError> {
        match message.kind {
            CommandKind::Water => {
                self.run_watering();
                Ok(())
            }
            CommandKind::GetStatus => {
                self.publish_status();
                Ok(())
            }
            CommandKind::GetReading => {
                self.publish_reading();
                Ok(())
            }
            CommandKind::OtaUpdate => self.start_update(&message.payload),
            CommandKind::OtaStatus => {
                self.publish_update_status();
                Ok(())
            }
            CommandKind::OtaCancel => self.cancel_update(),
            CommandKind::Unknown => Err(DispatchError::Unrecognized),
        }
    }

    /// Run the pump for the watering interval.  Blocks the worker — by
    /// contract, no other command is serviced meanwhile.
    fn run_watering(&mut self) {
        info!("watering: pump on for {:?}", self.config.watering_duration);
        self.actuator.set_pump(true);
        self.actuator.set_indicator(true);
        self.stats.pump_active.store(true, Ordering::SeqCst);
        self.notifier
            .publish(&self.config.response_topic, "watering started, pump on");

        std::thread::sleep(self.config.watering_duration);

        self.actuator.set_pump(false);
        self.actuator.set_indicator(false);
        self.stats.pump_active.store(false, Ordering::SeqCst);
        let total = self.stats.waterings.fetch_add(1, Ordering::SeqCst) + 1;
        self.notifier.publish(
            &self.config.response_topic,
            &format!("watering finished, pump off (total waterings: {total})"),
        );
    }

    fn publish_status(&self) {
        let s = self.stats.snapshot();
        let text = format!(
            "system: online\n\
             waterings: {}\n\
             processed commands: {}\n\
             failed commands: {}\n\
             pump: {}",
            s.waterings,
            s.processed,
            s.errors,
            if s.pump_active { "running" } else { "standby" },
        );
        self.notifier.publish(&self.config.response_topic, &text);
    }

    fn publish_reading(&self) {
        let text = match self.readings.latest() {
            Some(r) => format!(
                "moisture: {:.1}% (adc {}, {:.3} V) at {} s",
                r.moisture_pct, r.raw_adc, r.voltage, r.taken_at
            ),
            None => "no soil reading available yet".to_owned(),
        };
        self.notifier.publish(&self.config.response_topic, &text);
    }

    fn start_update(&self, locator: &str) -> Result<(), DispatchError> {
        if locator.is_empty() {
            self.notifier
                .publish(&self.config.response_topic, "error: firmware URL missing");
            return Err(DispatchError::MissingLocator);
        }

        // A finished update parks the engine in Success/Error; clear it so a
        // new flight can start without a device reboot.
        if self.engine.state().terminal() {
            self.engine.acknowledge().map_err(DispatchError::Update)?;
        }

        let request = UpdateRequest {
            url: locator.to_owned(),
            expected_version: None,
            auto_reboot: self.config.ota_auto_reboot,
            timeout: self.config.ota_timeout,
        };
        match self.engine.start(request) {
            Ok(()) => {
                self.notifier.publish(
                    &self.config.response_topic,
                    &format!("firmware update started from {locator}"),
                );
                Ok(())
            }
            Err(e) => {
                self.notifier.publish(
                    &self.config.response_topic,
                    &format!("firmware update not started: {e}"),
                );
                Err(e.into())
            }
        }
    }

    fn publish_update_status(&self) {
        let stats = self.engine.statistics();
        let text = format!(
            "firmware version: {}\n\
             state: {}\n\
             progress: {}%\n\
             attempted: {}\n\
             succeeded: {}\n\
             failed: {}",
            self.engine.current_version(),
            self.engine.state().label(),
            self.engine.progress(),
            stats.attempted,
            stats.succeeded,
            stats.failed,
        );
        self.notifier.publish(&self.config.response_topic, &text);
    }

    fn cancel_update(&self) -> Result<(), DispatchError> {
        match self.engine.cancel() {
            Ok(()) => {
                self.notifier
                    .publish(&self.config.response_topic, "update cancellation requested");
                Ok(())
            }
            Err(e) => {
                self.notifier.publish(
                    &self.config.response_topic,
                    &format!("nothing to cancel: {e}"),
                );
                Err(e.into())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
