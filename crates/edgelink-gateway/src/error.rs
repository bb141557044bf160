//! Collaborator error types.

use thiserror::Error;

use crate::firmware::model::FirmwareUpdateErrorCode;

/// Firmware file download failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// The referenced file is absent (local path missing, HTTP 404).
    #[error("File does not exist: {0}")]
    FileDoesNotExist(String),

    /// Any other failure.
    #[error("Download failed: {0}")]
    Unspecified(String),
}

impl DownloadError {
    /// Error code reported to the platform for this failure.
    pub fn error_code(&self) -> FirmwareUpdateErrorCode {
        match self {
            Self::FileDoesNotExist(_) => FirmwareUpdateErrorCode::FileSystemError,
            Self::Unspecified(_) => FirmwareUpdateErrorCode::UnspecifiedError,
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::FileDoesNotExist(e.to_string()),
            _ => Self::Unspecified(e.to_string()),
        }
    }
}

/// Firmware installation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("Installation failed: {0}")]
    Failed(String),

    #[error("Installation aborted")]
    Aborted,
}
