//! Firmware update orchestration.
//!
//! [`FirmwareUpdateService`] drives the per-device update sequence
//!
//! ```text
//! IDLE → DOWNLOADING → FILE_READY → INSTALLING → COMPLETED | ERROR
//! ```
//!
//! delegating file transfer and installation to the collaborators defined
//! here. Collaborator calls run in spawned tasks and report back through
//! the command buffer.

pub mod model;
pub mod service;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{DownloadError, InstallError};

pub use model::{
    FirmwareSessionState, FirmwareUpdateCommand, FirmwareUpdateCommandType,
    FirmwareUpdateErrorCode, FirmwareUpdateResponse, FirmwareUpdateStatus, FirmwareVersion,
};
pub use service::FirmwareUpdateService;

/// Fetches firmware files.
#[async_trait]
pub trait FileDownloader: Send + Sync {
    /// Download `url` and return the local path of the file.
    async fn download(&self, url: &str) -> std::result::Result<PathBuf, DownloadError>;
}

/// Installs firmware on a device. Supplied by the application.
#[async_trait]
pub trait FirmwareInstaller: Send + Sync {
    /// Install `file_path` on the device. Resolves when installation ends.
    async fn install(
        &self,
        device_key: &str,
        file_path: &Path,
    ) -> std::result::Result<(), InstallError>;

    /// Try to abort a running installation.
    ///
    /// Returns `false` if the installation can no longer be aborted.
    fn abort(&self, device_key: &str) -> bool;
}

/// Reports the firmware version running on a device.
pub trait FirmwareVersionProvider: Send + Sync {
    /// Current version, or an empty string if unknown.
    fn firmware_version(&self, device_key: &str) -> String;
}
