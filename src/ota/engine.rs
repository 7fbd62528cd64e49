//! The update engine and its download worker.
//!
//! One update may be in flight at any time.  `start()` claims the flight
//! slot, spawns the worker, and returns immediately; the worker streams the
//! image into the inactive partition, classifies any failure, and records
//! the terminal outcome in the statistics.  Cancellation is cooperative: a
//! flag sampled at chunk-read boundaries during the download phase only —
//! never mid-write or mid-commit.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};

use crate::app::ports::{
    Clock, FetchClient, FinalizeError, FirmwareStorage, Notifier, SystemControl,
};
use crate::config::SystemConfig;
use crate::drivers::task;

use super::image;
use super::progress::ProgressSender;
use super::state::{FailureKind, FirmwareVersion, Statistics, UpdateOutcome, UpdateState};

/// Download worker thread parameters.
const WORKER_PRIORITY: u8 = 5;
const WORKER_STACK_KB: usize = 8;

// ── Errors ────────────────────────────────────────────────────

/// Precondition failures, rejected synchronously to the caller.  Failures
/// inside the download protocol never surface here — they are absorbed by
/// the worker and recorded in the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// `start()` while an update is running or parked in a terminal state.
    AlreadyActive(UpdateState),
    /// `cancel()` with no update in flight.
    NotRunning(UpdateState),
    /// `acknowledge()` outside `Success`/`Error`.
    NotTerminal(UpdateState),
    /// `start()` with an empty locator.
    EmptyUrl,
}

impl core::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyActive(state) => {
                write!(f, "update already active (state: {})", state.label())
            }
            Self::NotRunning(state) => {
                write!(f, "no update in flight (state: {})", state.label())
            }
            Self::NotTerminal(state) => {
                write!(f, "nothing to acknowledge (state: {})", state.label())
            }
            Self::EmptyUrl => write!(f, "firmware URL is empty"),
        }
    }
}

// ── Configuration and request ─────────────────────────────────

/// Engine tuning, derived from [`SystemConfig`].
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Download chunk size in bytes.
    pub chunk_bytes: usize,
    /// Delay between the final notice and the reboot.
    pub reboot_grace: Duration,
    /// Topic for update notices.
    pub status_topic: String,
}

impl UpdateConfig {
    pub fn from_system(cfg: &SystemConfig) -> Self {
        Self {
            chunk_bytes: cfg.ota_chunk_bytes as usize,
            reboot_grace: Duration::from_millis(u64::from(cfg.ota_reboot_grace_ms)),
            status_topic: cfg.topics.ota_status.clone(),
        }
    }
}

/// One update request, as accepted by [`UpdateEngine::start`].
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Firmware source locator (URL).
    pub url: String,
    /// Version the requester expects to find, if it announced one.
    pub expected_version: Option<FirmwareVersion>,
    /// Reboot into the new image automatically on success.
    pub auto_reboot: bool,
    /// Per-operation fetch timeout.
    pub timeout: Duration,
}

// ── Collaborators ─────────────────────────────────────────────

/// The engine's collaborator bundle.  Cloned into each download worker.
#[derive(Clone)]
pub struct EngineDeps {
    pub storage: Arc<dyn FirmwareStorage>,
    pub fetch: Arc<dyn FetchClient>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub system: Arc<dyn SystemControl>,
}

// ── Shared state ──────────────────────────────────────────────

/// State written by the download worker and read concurrently by the
/// command worker.  Scalar fields are atomics; the composite statistics
/// record sits behind a mutex.
struct Shared {
    state: AtomicU8,
    progress: AtomicU8,
    cancel: AtomicBool,
    stats: Mutex<Statistics>,
}

impl Shared {
    fn state(&self) -> UpdateState {
        UpdateState::from_raw(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: UpdateState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn stats(&self) -> MutexGuard<'_, Statistics> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Engine ────────────────────────────────────────────────────

/// Thread-safe facade over the update state machine.
pub struct UpdateEngine {
    shared: Arc<Shared>,
    deps: EngineDeps,
    config: UpdateConfig,
    progress_tx: ProgressSender,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateEngine {
    /// Construct the engine.  Statistics are seeded with the running
    /// firmware version so a status query before any update reports it.
    pub fn new(deps: EngineDeps, config: UpdateConfig, progress_tx: ProgressSender) -> Self {
        let stats = Statistics {
            last_version: deps.storage.running_version(),
            ..Statistics::default()
        };
        info!("update engine ready, running version {}", stats.last_version);
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(UpdateState::Idle as u8),
                progress: AtomicU8::new(0),
                cancel: AtomicBool::new(false),
                stats: Mutex::new(stats),
            }),
            deps,
            config,
            progress_tx,
            worker: Mutex::new(None),
        }
    }

    /// Accept an update and spawn its download worker.  Returns immediately;
    /// the outcome is observable via [`state`](Self::state), the statistics,
    /// and the progress channel.
    pub fn start(&self, request: UpdateRequest) -> Result<(), UpdateError> {
        let state = self.state();
        if state != UpdateState::Idle {
            return Err(UpdateError::AlreadyActive(state));
        }
        if request.url.is_empty() {
            return Err(UpdateError::EmptyUrl);
        }

        // Claim the single flight slot.
        if self
            .shared
            .state
            .compare_exchange(
                UpdateState::Idle as u8,
                UpdateState::Downloading as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(UpdateError::AlreadyActive(self.state()));
        }

        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.progress.store(0, Ordering::SeqCst);
        self.shared.stats().attempted += 1;

        match &request.expected_version {
            Some(version) => info!("starting update from {} (expecting {version})", request.url),
            None => info!("starting update from {}", request.url),
        }

        let ctx = WorkerCtx {
            shared: Arc::clone(&self.shared),
            deps: self.deps.clone(),
            config: self.config.clone(),
            progress: self.progress_tx.clone(),
            request,
        };
        let handle = task::spawn_worker(WORKER_PRIORITY, WORKER_STACK_KB, "ota-dl\0", move || {
            run_worker(ctx);
        });

        // A previous worker, if any, already terminated (the flight slot was
        // free); dropping its handle just detaches it.
        *self.worker_slot() = Some(handle);
        Ok(())
    }

    /// Request cooperative cancellation of the in-flight update.  Honored at
    /// the next chunk-read boundary; a no-op once the download loop has
    /// moved on to verify/install.
    pub fn cancel(&self) -> Result<(), UpdateError> {
        let state = self.state();
        if !state.in_flight() {
            return Err(UpdateError::NotRunning(state));
        }
        self.shared.cancel.store(true, Ordering::SeqCst);
        warn!("update cancellation requested");
        Ok(())
    }

    /// Clear a terminal `Success`/`Error` back to `Idle`.  Statistics are
    /// untouched; progress resets to 0.
    pub fn acknowledge(&self) -> Result<(), UpdateError> {
        let state = self.state();
        if !state.terminal() {
            return Err(UpdateError::NotTerminal(state));
        }
        self.shared.set_state(UpdateState::Idle);
        self.shared.progress.store(0, Ordering::SeqCst);
        info!("terminal update state acknowledged");
        Ok(())
    }

    /// Current state.  Safe from any thread.
    pub fn state(&self) -> UpdateState {
        self.shared.state()
    }

    /// Download percentage of the current (or last) update, 0–100.
    pub fn progress(&self) -> u8 {
        self.shared.progress.load(Ordering::SeqCst)
    }

    /// Snapshot of the update counters.
    pub fn statistics(&self) -> Statistics {
        self.shared.stats().clone()
    }

    /// Clear the update counters.  Does not affect the update state.
    pub fn reset_statistics(&self) {
        let mut stats = self.shared.stats();
        *stats = Statistics {
            last_version: self.deps.storage.running_version(),
            ..Statistics::default()
        };
        info!("update statistics reset");
    }

    /// Version of the currently running image.
    pub fn current_version(&self) -> FirmwareVersion {
        self.deps.storage.running_version()
    }

    /// Block until the in-flight worker (if any) terminates.  Shutdown and
    /// test aid; the command path never calls this.
    pub fn join(&self) {
        let handle = self.worker_slot().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Download worker ───────────────────────────────────────────

struct WorkerCtx {
    shared: Arc<Shared>,
    deps: EngineDeps,
    config: UpdateConfig,
    progress: ProgressSender,
    request: UpdateRequest,
}

fn run_worker(ctx: WorkerCtx) {
    ctx.progress
        .emit(0, UpdateState::Downloading, "starting firmware download");

    let running = ctx.deps.storage.running_version();
    match perform(&ctx, &running) {
        Ok(new_version) => finish_success(&ctx, &new_version),
        Err(kind) => finish_failure(&ctx, kind),
    }
}

/// The download → verify → install protocol.  Any error return is terminal
/// for this update; the caller records it.
fn perform(ctx: &WorkerCtx, running: &FirmwareVersion) -> Result<FirmwareVersion, FailureKind> {
    let mut conn = ctx
        .deps
        .fetch
        .open(&ctx.request.url, ctx.request.timeout)
        .map_err(|e| {
            error!("cannot open firmware source: {e}");
            FailureKind::Network
        })?;

    let total = conn.content_length().map_err(|e| {
        error!("cannot determine firmware length: {e}");
        FailureKind::Download
    })?;
    info!("firmware size: {total} bytes");

    let mut writer = ctx.deps.storage.begin_update().map_err(|e| {
        error!("cannot open update partition: {e}");
        FailureKind::Install
    })?;

    let mut buf = alloc_chunk(ctx.config.chunk_bytes)?;
    let mut downloaded: u64 = 0;
    let mut last_decade: u8 = 0;
    let mut new_version: Option<FirmwareVersion> = None;

    loop {
        // Cancellation sample point — only here, never mid-write.
        if ctx.shared.cancel.load(Ordering::SeqCst) {
            warn!("update cancelled after {downloaded} bytes");
            return Err(FailureKind::Download);
        }

        let n = conn.read(&mut buf).map_err(|e| {
            error!("firmware read failed: {e}");
            FailureKind::Download
        })?;
        if n == 0 {
            break;
        }

        if new_version.is_none() {
            if let Some(version) = image::descriptor_version(&buf[..n]) {
                if version == *running {
                    warn!("image version {version} matches the running firmware, rejecting");
                    return Err(FailureKind::Verify);
                }
                info!("new firmware version: {version}");
                new_version = Some(version);
            }
        }

        writer.write(&buf[..n]).map_err(|e| {
            error!("partition write failed: {e}");
            FailureKind::Install
        })?;
        downloaded += n as u64;

        if total > 0 {
            let pct = ((downloaded.min(total) * 100) / total) as u8;
            ctx.shared.progress.store(pct, Ordering::SeqCst);
            let decade = pct / 10;
            if decade > last_decade {
                last_decade = decade;
                ctx.progress.emit(
                    pct,
                    UpdateState::Downloading,
                    format!("download progress: {pct}%"),
                );
            }
        }
    }

    let Some(new_version) = new_version else {
        error!("stream ended before a full image descriptor arrived ({downloaded} bytes)");
        return Err(FailureKind::Download);
    };
    info!("firmware download complete ({downloaded} bytes)");

    let pct = ctx.shared.progress.load(Ordering::SeqCst);
    ctx.shared.set_state(UpdateState::Verifying);
    ctx.progress
        .emit(pct, UpdateState::Verifying, "verifying firmware image");
    let mut completed = writer.finalize().map_err(|e| {
        error!("finalize failed: {e}");
        match e {
            FinalizeError::Integrity => FailureKind::Verify,
            FinalizeError::Storage => FailureKind::Install,
        }
    })?;

    ctx.shared.set_state(UpdateState::Installing);
    ctx.progress
        .emit(pct, UpdateState::Installing, "installing new firmware");
    completed.set_boot_target().map_err(|e| {
        error!("set boot target failed: {e}");
        FailureKind::Install
    })?;

    Ok(new_version)
}

fn finish_success(ctx: &WorkerCtx, new_version: &FirmwareVersion) {
    ctx.shared.set_state(UpdateState::Success);
    ctx.shared.progress.store(100, Ordering::SeqCst);
    {
        let mut stats = ctx.shared.stats();
        stats.succeeded += 1;
        stats.last_result = Some(UpdateOutcome::Success);
        stats.last_version = new_version.clone();
        stats.last_timestamp = ctx.deps.clock.now_secs();
    }
    ctx.progress
        .emit(100, UpdateState::Success, "update complete");
    info!("update to {new_version} installed");

    if ctx.request.auto_reboot {
        let grace = ctx.config.reboot_grace;
        ctx.deps.notifier.publish(
            &ctx.config.status_topic,
            &format!("update to {new_version} installed, rebooting in {} s", grace.as_secs()),
        );
        // Let the notice flush before the link goes down.
        std::thread::sleep(grace);
        ctx.deps.system.restart();
    }
}

fn finish_failure(ctx: &WorkerCtx, kind: FailureKind) {
    ctx.shared.set_state(UpdateState::Error);
    {
        let mut stats = ctx.shared.stats();
        stats.failed += 1;
        stats.last_result = Some(UpdateOutcome::Failed(kind));
    }
    let pct = ctx.shared.progress.load(Ordering::SeqCst);
    ctx.progress
        .emit(pct, UpdateState::Error, format!("update failed: {kind}"));
    ctx.deps.notifier.publish(
        &ctx.config.status_topic,
        &format!("firmware update failed: {kind}"),
    );
    error!("update failed: {kind}");
}

/// Allocate the download buffer.  Allocation failure is terminal for the
/// update but must not abort the process.
fn alloc_chunk(len: usize) -> Result<Vec<u8>, FailureKind> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(len).is_err() {
        error!("download buffer allocation failed ({len} bytes)");
        return Err(FailureKind::Memory);
    }
    buf.resize(len, 0);
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────
