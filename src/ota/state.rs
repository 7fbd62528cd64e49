//! Update state machine vocabulary and statistics record.

/// Firmware version string — the image descriptor carries a fixed 32-byte
/// NUL-padded field, so a fixed-capacity string avoids allocation.
pub type FirmwareVersion = heapless::String<32>;

/// Process-wide update state.  A single value, not per-session: only one
/// update may be in flight at a time.
///
/// Transitions follow
/// `Idle → Downloading → {Verifying → Installing → Success | Error}`;
/// every non-idle state may drop straight to `Error`.  `Success` and `Error`
/// are terminal until explicitly acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateState {
    Idle = 0,
    Downloading = 1,
    Verifying = 2,
    Installing = 3,
    Success = 4,
    Error = 5,
}

impl UpdateState {
    /// Decode the atomic cell's raw value.
    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Downloading,
            2 => Self::Verifying,
            3 => Self::Installing,
            4 => Self::Success,
            5 => Self::Error,
            _ => Self::Idle,
        }
    }

    /// Human-readable label used in status snapshots.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Installing => "installing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// An update worker is currently running.
    pub fn in_flight(self) -> bool {
        matches!(self, Self::Downloading | Self::Verifying | Self::Installing)
    }

    /// The last update finished and has not been acknowledged yet.
    pub fn terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Classified reason an update ended in `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection to the firmware source could not be opened.
    Network,
    /// Read failure, cancellation, or a stream too short to carry an image
    /// descriptor.
    Download,
    /// Version-identical rejection or a finalize integrity failure.
    Verify,
    /// Partition open, write, non-integrity finalize, or boot-target failure.
    Install,
    /// Download buffer allocation failed.
    Memory,
}

impl core::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Network => write!(f, "network error"),
            Self::Download => write!(f, "download error"),
            Self::Verify => write!(f, "verify error"),
            Self::Install => write!(f, "install error"),
            Self::Memory => write!(f, "out of memory"),
        }
    }
}

/// Terminal result of an update, recorded in [`Statistics::last_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Success,
    Failed(FailureKind),
}

impl core::fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed(kind) => write!(f, "{kind}"),
        }
    }
}

/// Process-wide update counters.  Incremented exactly once per terminal
/// transition; cleared only by an explicit reset.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Updates accepted by `start()`.
    pub attempted: u32,
    /// Updates that reached `Success`.
    pub succeeded: u32,
    /// Updates that reached `Error`.
    pub failed: u32,
    /// Outcome of the most recent terminal transition.
    pub last_result: Option<UpdateOutcome>,
    /// Version installed by the last successful update (seeded with the
    /// running version at boot).
    pub last_version: FirmwareVersion,
    /// Seconds-since-boot of the last successful update.
    pub last_timestamp: u64,
}
