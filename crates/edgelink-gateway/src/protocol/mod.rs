//! Message family codecs used by the gateway services.
//!
//! The traits extend [`edgelink_core::Protocol`] with the encode/decode
//! operations each service needs. JSON implementations are provided for
//! the default channel layout.

pub mod json_firmware;
pub mod json_registration;
pub mod json_status;

use edgelink_core::{AsProtocol, Message, Protocol, Result};

use crate::firmware::model::{FirmwareUpdateCommand, FirmwareUpdateResponse, FirmwareVersion};
use crate::registration::model::{
    RegistrationResponse, SubdeviceRegistrationRequest, SubdeviceUpdateRequest,
};
use crate::status::model::DeviceStatusReport;

pub use json_firmware::JsonFirmwareUpdateProtocol;
pub use json_registration::JsonRegistrationProtocol;
pub use json_status::JsonStatusProtocol;

/// Firmware update message family.
pub trait FirmwareUpdateProtocol: Protocol + AsProtocol {
    /// Whether the message is an inbound firmware update command.
    fn is_firmware_update_message(&self, message: &Message) -> bool;

    /// Decode an inbound command.
    fn make_firmware_update_command(&self, message: &Message) -> Result<FirmwareUpdateCommand>;

    /// Encode a status response addressed from `device_key`.
    fn make_response_message(
        &self,
        device_key: &str,
        response: &FirmwareUpdateResponse,
    ) -> Result<Message>;

    /// Encode a firmware version report.
    fn make_firmware_version_message(&self, version: &FirmwareVersion) -> Result<Message>;

    /// Decode a status response produced by [`Self::make_response_message`].
    fn parse_response(&self, message: &Message) -> Result<FirmwareUpdateResponse>;
}

/// Sub-device registration message family.
pub trait RegistrationProtocol: Protocol + AsProtocol {
    /// Whether the message answers a registration request.
    fn is_registration_response(&self, message: &Message) -> bool;

    /// Whether the message answers an update request.
    fn is_update_response(&self, message: &Message) -> bool;

    /// Decode a registration or update response.
    fn make_registration_response(&self, message: &Message) -> Result<RegistrationResponse>;

    fn make_registration_request_message(
        &self,
        request: &SubdeviceRegistrationRequest,
    ) -> Result<Message>;

    fn make_update_request_message(&self, request: &SubdeviceUpdateRequest) -> Result<Message>;
}

/// Device status message family.
pub trait StatusProtocol: Protocol + AsProtocol {
    /// Whether the message is a status request, for one device or all.
    fn is_status_request_message(&self, message: &Message) -> bool;

    fn make_status_response_message(&self, report: &DeviceStatusReport) -> Result<Message>;

    fn make_status_update_message(&self, report: &DeviceStatusReport) -> Result<Message>;

    /// Encode the last will announcing `device_keys` offline.
    fn make_last_will_message(&self, device_keys: &[String]) -> Result<Message>;
}
