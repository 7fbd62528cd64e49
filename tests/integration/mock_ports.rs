//! Mock port adapters for integration tests.
//!
//! Every mock records its call history so tests can assert on the full
//! interaction without touching real GPIO, flash, or the network.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use soilwarden::app::ports::{
    ActuatorPort, Clock, CompletedUpdate, FetchClient, FetchConnection, FetchError,
    FirmwareStorage, FinalizeError, Notifier, PartitionWriter, ReadingSource, SoilReading,
    StorageError, SystemControl,
};
use soilwarden::ota::FirmwareVersion;

pub fn version(text: &str) -> FirmwareVersion {
    let mut v = FirmwareVersion::new();
    v.push_str(text).expect("version fits the field");
    v
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

// ── Notifier ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl Notifier for MockNotifier {
    fn publish(&self, topic: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_owned(), message.to_owned()));
    }
}

#[allow(dead_code)]
impl MockNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

// ── Clock / system ────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    secs: AtomicU64,
}

impl MockClock {
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockSystem {
    restarts: AtomicU32,
}

impl MockSystem {
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl SystemControl for MockSystem {
    fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Actuator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    PumpOn,
    PumpOff,
    LedOn,
    LedOff,
}

#[derive(Clone, Default)]
pub struct MockActuator {
    pub calls: Arc<Mutex<Vec<(Instant, ActuatorCall)>>>,
}

impl MockActuator {
    pub fn history(&self) -> Vec<ActuatorCall> {
        self.calls.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    /// Time between the pump-on and pump-off edges, if both happened.
    pub fn pump_interval(&self) -> Option<Duration> {
        let calls = self.calls.lock().unwrap();
        let on = calls.iter().find(|(_, c)| *c == ActuatorCall::PumpOn)?.0;
        let off = calls.iter().find(|(_, c)| *c == ActuatorCall::PumpOff)?.0;
        Some(off.duration_since(on))
    }
}

impl ActuatorPort for MockActuator {
    fn set_pump(&mut self, on: bool) {
        let call = if on {
            ActuatorCall::PumpOn
        } else {
            ActuatorCall::PumpOff
        };
        self.calls.lock().unwrap().push((Instant::now(), call));
    }

    fn set_indicator(&mut self, on: bool) {
        let call = if on {
            ActuatorCall::LedOn
        } else {
            ActuatorCall::LedOff
        };
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

// ── Readings ──────────────────────────────────────────────────

pub struct FixedReading(pub Option<SoilReading>);

impl ReadingSource for FixedReading {
    fn latest(&self) -> Option<SoilReading> {
        self.0
    }
}

// ── Fetch ─────────────────────────────────────────────────────

/// Serves an in-memory firmware image with scriptable failure points.
pub struct ScriptedFetch {
    image: Vec<u8>,
    chunk: usize,
    fail_opens_left: AtomicU32,
    fail_length: bool,
    fail_read_after: Option<usize>,
    read_delay: Duration,
}

impl ScriptedFetch {
    pub fn serving(image: Vec<u8>, chunk: usize) -> Self {
        Self {
            image,
            chunk,
            fail_opens_left: AtomicU32::new(0),
            fail_length: false,
            fail_read_after: None,
            read_delay: Duration::ZERO,
        }
    }

    /// The next `n` opens fail with a connect error.
    pub fn fail_opens(mut self, n: u32) -> Self {
        self.fail_opens_left = AtomicU32::new(n);
        self
    }

    pub fn fail_length(mut self) -> Self {
        self.fail_length = true;
        self
    }

    /// Reads fail once `bytes` have been served.
    pub fn fail_read_after(mut self, bytes: usize) -> Self {
        self.fail_read_after = Some(bytes);
        self
    }

    /// Sleep per read — makes room for cancellation mid-download.
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }
}

impl FetchClient for ScriptedFetch {
    fn open(&self, _url: &str, _timeout: Duration) -> Result<Box<dyn FetchConnection>, FetchError> {
        let left = self.fail_opens_left.load(Ordering::SeqCst);
        if left > 0 {
            self.fail_opens_left.store(left - 1, Ordering::SeqCst);
            return Err(FetchError::Connect);
        }
        Ok(Box::new(ScriptedConnection {
            image: self.image.clone(),
            pos: 0,
            chunk: self.chunk,
            fail_length: self.fail_length,
            fail_read_after: self.fail_read_after,
            read_delay: self.read_delay,
        }))
    }
}

struct ScriptedConnection {
    image: Vec<u8>,
    pos: usize,
    chunk: usize,
    fail_length: bool,
    fail_read_after: Option<usize>,
    read_delay: Duration,
}

impl FetchConnection for ScriptedConnection {
    fn content_length(&mut self) -> Result<u64, FetchError> {
        if self.fail_length {
            return Err(FetchError::Protocol);
        }
        Ok(self.image.len() as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        if let Some(limit) = self.fail_read_after {
            if self.pos >= limit {
                return Err(FetchError::Io);
            }
        }
        let n = self
            .chunk
            .min(buf.len())
            .min(self.image.len() - self.pos);
        buf[..n].copy_from_slice(&self.image[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeBehavior {
    Succeed,
    FailIntegrity,
    FailStorage,
}

/// In-memory partition with scriptable failure points.
pub struct MockStorage {
    running: FirmwareVersion,
    pub written: Arc<Mutex<Vec<u8>>>,
    pub boot_target_set: Arc<Mutex<bool>>,
    fail_begin: bool,
    fail_write: bool,
    finalize: FinalizeBehavior,
    fail_boot_set: bool,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn with_running(text: &str) -> Self {
        Self {
            running: version(text),
            written: Arc::default(),
            boot_target_set: Arc::new(Mutex::new(false)),
            fail_begin: false,
            fail_write: false,
            finalize: FinalizeBehavior::Succeed,
            fail_boot_set: false,
        }
    }

    pub fn fail_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn fail_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    pub fn finalize_behavior(mut self, behavior: FinalizeBehavior) -> Self {
        self.finalize = behavior;
        self
    }

    pub fn fail_boot_set(mut self) -> Self {
        self.fail_boot_set = true;
        self
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl FirmwareStorage for MockStorage {
    fn begin_update(&self) -> Result<Box<dyn PartitionWriter>, StorageError> {
        if self.fail_begin {
            return Err(StorageError::OpenFailed);
        }
        Ok(Box::new(MockWriter {
            written: Arc::clone(&self.written),
            boot_target_set: Arc::clone(&self.boot_target_set),
            fail_write: self.fail_write,
            finalize: self.finalize,
            fail_boot_set: self.fail_boot_set,
        }))
    }

    fn running_version(&self) -> FirmwareVersion {
        self.running.clone()
    }
}

struct MockWriter {
    written: Arc<Mutex<Vec<u8>>>,
    boot_target_set: Arc<Mutex<bool>>,
    fail_write: bool,
    finalize: FinalizeBehavior,
    fail_boot_set: bool,
}

impl PartitionWriter for MockWriter {
    fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_write {
            return Err(StorageError::WriteFailed);
        }
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Box<dyn CompletedUpdate>, FinalizeError> {
        match self.finalize {
            FinalizeBehavior::Succeed => Ok(Box::new(MockCompleted {
                boot_target_set: self.boot_target_set,
                fail_boot_set: self.fail_boot_set,
            })),
            FinalizeBehavior::FailIntegrity => Err(FinalizeError::Integrity),
            FinalizeBehavior::FailStorage => Err(FinalizeError::Storage),
        }
    }
}

struct MockCompleted {
    boot_target_set: Arc<Mutex<bool>>,
    fail_boot_set: bool,
}

impl CompletedUpdate for MockCompleted {
    fn set_boot_target(&mut self) -> Result<(), StorageError> {
        if self.fail_boot_set {
            return Err(StorageError::BootSetFailed);
        }
        *self.boot_target_set.lock().unwrap() = true;
        Ok(())
    }
}
