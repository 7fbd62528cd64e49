//! Flash partition adapter — [`FirmwareStorage`] backed by the `esp-ota`
//! crate (safe wrapper around the ESP-IDF OTA partition API, no unsafe FFI
//! in the write path).

use log::{info, warn};

use crate::app::ports::{
    CompletedUpdate, FinalizeError, FirmwareStorage, PartitionWriter, StorageError,
};
use crate::ota::FirmwareVersion;

pub struct EspOtaStorage;

impl EspOtaStorage {
    pub fn new() -> Self {
        Self
    }
}

impl FirmwareStorage for EspOtaStorage {
    fn begin_update(&self) -> Result<Box<dyn PartitionWriter>, StorageError> {
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {e:?}");
            StorageError::OpenFailed
        })?;
        Ok(Box::new(EspPartitionWriter { update }))
    }

    fn running_version(&self) -> FirmwareVersion {
        running_version()
    }
}

/// Version string of the running image, from its embedded app descriptor.
pub fn running_version() -> FirmwareVersion {
    let desc = unsafe { &*esp_idf_svc::sys::esp_app_get_description() };
    let mut version = FirmwareVersion::new();
    for &c in &desc.version {
        let b = c as u8;
        if b == 0 {
            break;
        }
        if version.push(char::from(b)).is_err() {
            break;
        }
    }
    version
}

/// Mark the running image valid so the rollback watchdog does not revert to
/// the previous firmware after the next few boots.  Call once at startup.
pub fn mark_boot_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("mark_app_valid failed: {e:?}"),
    }
}

struct EspPartitionWriter {
    update: esp_ota::OtaUpdate,
}

impl PartitionWriter for EspPartitionWriter {
    fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.update.write(data).map_err(|e| {
            warn!("esp-ota write failed: {e:?}");
            StorageError::WriteFailed
        })
    }

    fn finalize(self: Box<Self>) -> Result<Box<dyn CompletedUpdate>, FinalizeError> {
        match self.update.finalize() {
            Ok(completed) => Ok(Box::new(EspCompletedUpdate { completed })),
            Err(e) => {
                warn!("esp-ota finalize failed: {e:?}");
                // esp-ota does not expose the validate-failed code directly;
                // the debug representation carries it through.
                let text = format!("{e:?}");
                if text.contains("Validate") || text.contains("VALIDATE") {
                    Err(FinalizeError::Integrity)
                } else {
                    Err(FinalizeError::Storage)
                }
            }
        }
    }
}

struct EspCompletedUpdate {
    completed: esp_ota::CompletedOtaUpdate,
}

impl CompletedUpdate for EspCompletedUpdate {
    fn set_boot_target(&mut self) -> Result<(), StorageError> {
        self.completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {e:?}");
            StorageError::BootSetFailed
        })
    }
}
