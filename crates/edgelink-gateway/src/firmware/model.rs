//! Firmware update domain types.

use serde::{Deserialize, Serialize};

/// Kind of firmware update command sent by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirmwareUpdateCommandType {
    /// Platform pushes the file in chunks (not supported)
    FileUpload,
    /// Gateway fetches the file from a URL
    UrlDownload,
    /// Install a previously downloaded file
    Install,
    /// Abort the running update
    Abort,
}

/// Decoded firmware update command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareUpdateCommand {
    pub command: FirmwareUpdateCommandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_install: Option<bool>,
}

impl FirmwareUpdateCommand {
    pub fn new(command: FirmwareUpdateCommandType) -> Self {
        Self {
            command,
            url: None,
            auto_install: None,
        }
    }

    /// `URL_DOWNLOAD` command.
    pub fn url_download(url: impl Into<String>, auto_install: bool) -> Self {
        Self {
            command: FirmwareUpdateCommandType::UrlDownload,
            url: Some(url.into()),
            auto_install: Some(auto_install),
        }
    }

    /// Whether installation should start right after the download.
    pub fn auto_install(&self) -> bool {
        self.auto_install.unwrap_or(false)
    }
}

/// Status reported back to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirmwareUpdateStatus {
    FileReady,
    Installation,
    Completed,
    Aborted,
    Error,
}

/// Error detail accompanying an [`FirmwareUpdateStatus::Error`] response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirmwareUpdateErrorCode {
    UnspecifiedError,
    FileUploadDisabled,
    UnsupportedFileSize,
    InstallationFailed,
    MalformedUrl,
    FileSystemError,
    RetryCountExceeded,
}

/// Response published for every firmware update milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareUpdateResponse {
    pub status: FirmwareUpdateStatus,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<FirmwareUpdateErrorCode>,
}

impl FirmwareUpdateResponse {
    /// Non-error milestone response.
    pub fn status(status: FirmwareUpdateStatus) -> Self {
        Self {
            status,
            error_code: None,
        }
    }

    /// `ERROR` response with the given code.
    pub fn error(code: FirmwareUpdateErrorCode) -> Self {
        Self {
            status: FirmwareUpdateStatus::Error,
            error_code: Some(code),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == FirmwareUpdateStatus::Error
    }
}

/// Firmware version currently running on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub device_key: String,
    pub version: String,
}

impl FirmwareVersion {
    pub fn new(device_key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            device_key: device_key.into(),
            version: version.into(),
        }
    }
}

/// Phase of an active firmware update session.
///
/// A device without a session is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirmwareSessionState {
    Downloading,
    FileReady,
    Installing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let command: FirmwareUpdateCommand = serde_json::from_str(
            r#"{"command":"URL_DOWNLOAD","url":"http://x/fw.bin","autoInstall":true}"#,
        )
        .unwrap();

        assert_eq!(command, FirmwareUpdateCommand::url_download("http://x/fw.bin", true));
        assert!(command.auto_install());
    }

    #[test]
    fn test_command_optional_fields() {
        let command: FirmwareUpdateCommand =
            serde_json::from_str(r#"{"command":"ABORT"}"#).unwrap();

        assert_eq!(command.command, FirmwareUpdateCommandType::Abort);
        assert_eq!(command.url, None);
        assert!(!command.auto_install());
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<FirmwareUpdateCommand>(r#"{"command":"REBOOT"}"#).is_err());
    }

    #[test]
    fn test_response_wire_format() {
        let error = FirmwareUpdateResponse::error(FirmwareUpdateErrorCode::FileSystemError);
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"status":"ERROR","error":"FILE_SYSTEM_ERROR"}"#
        );
        assert!(error.is_error());

        let ready = FirmwareUpdateResponse::status(FirmwareUpdateStatus::FileReady);
        assert_eq!(serde_json::to_string(&ready).unwrap(), r#"{"status":"FILE_READY"}"#);
        assert!(!ready.is_error());
    }
}
