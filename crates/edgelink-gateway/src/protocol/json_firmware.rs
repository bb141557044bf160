//! JSON firmware update protocol.
//!
//! Channels:
//! - inbound commands: `p2d/firmware_update/d/<device_key>`
//! - status responses: `d2p/firmware_update/d/<device_key>`
//! - version reports: `d2p/firmware_version/d/<device_key>` (plain text payload)

use edgelink_core::protocol::CHANNEL_SINGLE_LEVEL_WILDCARD;
use edgelink_core::{device_channel, topic_matches, Error, Message, Protocol, Result};

use super::FirmwareUpdateProtocol;
use crate::firmware::model::{FirmwareUpdateCommand, FirmwareUpdateResponse, FirmwareVersion};

pub const FIRMWARE_UPDATE_COMMAND_ROOT: &str = "p2d/firmware_update";
pub const FIRMWARE_UPDATE_RESPONSE_ROOT: &str = "d2p/firmware_update";
pub const FIRMWARE_VERSION_ROOT: &str = "d2p/firmware_version";

/// JSON codec for firmware update commands and responses.
#[derive(Debug, Clone)]
pub struct JsonFirmwareUpdateProtocol {
    command_pattern: String,
    response_root: String,
    version_root: String,
}

impl JsonFirmwareUpdateProtocol {
    pub fn new() -> Self {
        Self::with_roots(
            FIRMWARE_UPDATE_COMMAND_ROOT,
            FIRMWARE_UPDATE_RESPONSE_ROOT,
            FIRMWARE_VERSION_ROOT,
        )
    }

    /// Use custom channel roots. Device channels are `<root>/d/<device_key>`.
    pub fn with_roots(command_root: &str, response_root: &str, version_root: &str) -> Self {
        Self {
            command_pattern: device_channel(command_root, CHANNEL_SINGLE_LEVEL_WILDCARD),
            response_root: response_root.to_string(),
            version_root: version_root.to_string(),
        }
    }

    /// Channel responses for `device_key` are published on.
    pub fn response_channel(&self, device_key: &str) -> String {
        device_channel(&self.response_root, device_key)
    }

    /// Channel version reports for `device_key` are published on.
    pub fn version_channel(&self, device_key: &str) -> String {
        device_channel(&self.version_root, device_key)
    }
}

impl Default for JsonFirmwareUpdateProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for JsonFirmwareUpdateProtocol {
    fn name(&self) -> &str {
        "json-firmware-update"
    }

    fn inbound_channels(&self) -> Vec<String> {
        vec![self.command_pattern.clone()]
    }
}

impl FirmwareUpdateProtocol for JsonFirmwareUpdateProtocol {
    fn is_firmware_update_message(&self, message: &Message) -> bool {
        topic_matches(&self.command_pattern, message.channel())
    }

    fn make_firmware_update_command(&self, message: &Message) -> Result<FirmwareUpdateCommand> {
        serde_json::from_str(message.content()).map_err(|e| {
            Error::Decode(format!(
                "Invalid firmware update command on '{}': {}",
                message.channel(),
                e
            ))
        })
    }

    fn make_response_message(
        &self,
        device_key: &str,
        response: &FirmwareUpdateResponse,
    ) -> Result<Message> {
        let content = serde_json::to_string(response)
            .map_err(|e| Error::Encode(format!("Firmware update response: {}", e)))?;

        Ok(Message::new(self.response_channel(device_key), content))
    }

    fn make_firmware_version_message(&self, version: &FirmwareVersion) -> Result<Message> {
        if version.device_key.is_empty() {
            return Err(Error::Encode("Firmware version without device key".to_string()));
        }

        Ok(Message::new(
            self.version_channel(&version.device_key),
            version.version.clone(),
        ))
    }

    fn parse_response(&self, message: &Message) -> Result<FirmwareUpdateResponse> {
        serde_json::from_str(message.content()).map_err(|e| {
            Error::Decode(format!(
                "Invalid firmware update response on '{}': {}",
                message.channel(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::model::{
        FirmwareUpdateCommandType, FirmwareUpdateErrorCode, FirmwareUpdateStatus,
    };

    #[test]
    fn test_inbound_channels() {
        let protocol = JsonFirmwareUpdateProtocol::new();
        assert_eq!(protocol.inbound_channels(), vec!["p2d/firmware_update/d/+"]);
    }

    #[test]
    fn test_recognizes_commands() {
        let protocol = JsonFirmwareUpdateProtocol::new();

        let command = Message::new("p2d/firmware_update/d/dev1", r#"{"command":"INSTALL"}"#);
        assert!(protocol.is_firmware_update_message(&command));
        assert_eq!(
            protocol.extract_device_key(command.channel()),
            Some("dev1".to_string())
        );
        assert_eq!(
            protocol.make_firmware_update_command(&command).unwrap().command,
            FirmwareUpdateCommandType::Install
        );

        let other = Message::new("p2d/subdevice_registration/d/dev1", "{}");
        assert!(!protocol.is_firmware_update_message(&other));
    }

    #[test]
    fn test_malformed_command() {
        let protocol = JsonFirmwareUpdateProtocol::new();
        let message = Message::new("p2d/firmware_update/d/dev1", "not json");

        let err = protocol.make_firmware_update_command(&message).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_response_round_trip() {
        let protocol = JsonFirmwareUpdateProtocol::new();

        for response in [
            FirmwareUpdateResponse::status(FirmwareUpdateStatus::FileReady),
            FirmwareUpdateResponse::status(FirmwareUpdateStatus::Aborted),
            FirmwareUpdateResponse::error(FirmwareUpdateErrorCode::InstallationFailed),
        ] {
            let message = protocol.make_response_message("dev1", &response).unwrap();
            assert_eq!(message.channel(), "d2p/firmware_update/d/dev1");
            assert_eq!(protocol.parse_response(&message).unwrap(), response);
        }
    }

    #[test]
    fn test_version_message() {
        let protocol = JsonFirmwareUpdateProtocol::new();

        let message = protocol
            .make_firmware_version_message(&FirmwareVersion::new("dev1", "1.2.0"))
            .unwrap();
        assert_eq!(message, Message::new("d2p/firmware_version/d/dev1", "1.2.0"));

        assert!(protocol
            .make_firmware_version_message(&FirmwareVersion::new("", "1.2.0"))
            .is_err());
    }

    #[test]
    fn test_custom_roots() {
        let protocol = JsonFirmwareUpdateProtocol::with_roots("fw", "fw_status", "fw_version");

        assert_eq!(protocol.inbound_channels(), vec!["fw/d/+"]);
        assert!(protocol.is_firmware_update_message(&Message::new("fw/d/dev1", "{}")));
        assert_eq!(protocol.response_channel("dev1"), "fw_status/d/dev1");
    }
}
