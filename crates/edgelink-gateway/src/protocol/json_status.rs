//! JSON device status protocol.
//!
//! The platform asks on `p2d/subdevice_status_request` (every device) or
//! `p2d/subdevice_status_request/d/<key>`. Answers go to
//! `d2p/subdevice_status_response/d/<key>`, unprompted changes to
//! `d2p/subdevice_status_update/d/<key>`, both as `{"state":"CONNECTED"}`.
//! The last will is the JSON array of device keys on `lastwill`.

use edgelink_core::protocol::CHANNEL_SINGLE_LEVEL_WILDCARD;
use edgelink_core::{device_channel, topic_matches, Error, Message, Protocol, Result};
use serde::Serialize;

use super::StatusProtocol;
use crate::status::model::{DeviceStatus, DeviceStatusReport};

pub const STATUS_REQUEST_ROOT: &str = "p2d/subdevice_status_request";
pub const STATUS_RESPONSE_ROOT: &str = "d2p/subdevice_status_response";
pub const STATUS_UPDATE_ROOT: &str = "d2p/subdevice_status_update";
pub const LAST_WILL_CHANNEL: &str = "lastwill";

#[derive(Serialize)]
struct StatusPayload {
    state: DeviceStatus,
}

/// JSON codec for status requests, responses, updates and the last will.
#[derive(Debug, Clone)]
pub struct JsonStatusProtocol {
    device_request_pattern: String,
}

impl JsonStatusProtocol {
    pub fn new() -> Self {
        Self {
            device_request_pattern: device_channel(
                STATUS_REQUEST_ROOT,
                CHANNEL_SINGLE_LEVEL_WILDCARD,
            ),
        }
    }

    fn status_message(&self, root: &str, report: &DeviceStatusReport) -> Result<Message> {
        if report.device_key.is_empty() {
            return Err(Error::Encode("Device status without device key".to_string()));
        }

        let content = serde_json::to_string(&StatusPayload {
            state: report.status,
        })
        .map_err(|e| Error::Encode(format!("Device status: {}", e)))?;

        Ok(Message::new(device_channel(root, &report.device_key), content))
    }
}

impl Default for JsonStatusProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for JsonStatusProtocol {
    fn name(&self) -> &str {
        "json-status"
    }

    fn inbound_channels(&self) -> Vec<String> {
        vec![
            STATUS_REQUEST_ROOT.to_string(),
            self.device_request_pattern.clone(),
        ]
    }
}

impl StatusProtocol for JsonStatusProtocol {
    fn is_status_request_message(&self, message: &Message) -> bool {
        message.channel() == STATUS_REQUEST_ROOT
            || topic_matches(&self.device_request_pattern, message.channel())
    }

    fn make_status_response_message(&self, report: &DeviceStatusReport) -> Result<Message> {
        self.status_message(STATUS_RESPONSE_ROOT, report)
    }

    fn make_status_update_message(&self, report: &DeviceStatusReport) -> Result<Message> {
        self.status_message(STATUS_UPDATE_ROOT, report)
    }

    fn make_last_will_message(&self, device_keys: &[String]) -> Result<Message> {
        let content = serde_json::to_string(device_keys)
            .map_err(|e| Error::Encode(format!("Last will: {}", e)))?;
        Ok(Message::new(LAST_WILL_CHANNEL, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_requests() {
        let protocol = JsonStatusProtocol::new();

        let all = Message::new("p2d/subdevice_status_request", "");
        let one = Message::new("p2d/subdevice_status_request/d/pump-1", "");
        let other = Message::new("p2d/subdevice_update/d/pump-1", "");

        assert!(protocol.is_status_request_message(&all));
        assert!(protocol.is_status_request_message(&one));
        assert!(!protocol.is_status_request_message(&other));

        assert_eq!(protocol.extract_device_key(all.channel()), None);
        assert_eq!(
            protocol.extract_device_key(one.channel()),
            Some("pump-1".to_string())
        );
    }

    #[test]
    fn test_status_messages() {
        let protocol = JsonStatusProtocol::new();
        let report = DeviceStatusReport::new("pump-1", DeviceStatus::Service);

        let response = protocol.make_status_response_message(&report).unwrap();
        assert_eq!(response.channel(), "d2p/subdevice_status_response/d/pump-1");
        assert_eq!(response.content(), r#"{"state":"SERVICE"}"#);

        let update = protocol.make_status_update_message(&report).unwrap();
        assert_eq!(update.channel(), "d2p/subdevice_status_update/d/pump-1");
        assert_eq!(update.content(), r#"{"state":"SERVICE"}"#);
    }

    #[test]
    fn test_status_without_key_rejected() {
        let protocol = JsonStatusProtocol::new();
        let report = DeviceStatusReport::new("", DeviceStatus::Offline);

        assert!(matches!(
            protocol.make_status_update_message(&report),
            Err(Error::Encode(_))
        ));
    }

    #[test]
    fn test_last_will() {
        let protocol = JsonStatusProtocol::new();

        let message = protocol
            .make_last_will_message(&["pump-1".to_string(), "valve-1".to_string()])
            .unwrap();
        assert_eq!(message.channel(), "lastwill");
        assert_eq!(message.content(), r#"["pump-1","valve-1"]"#);

        let empty = protocol.make_last_will_message(&[]).unwrap();
        assert_eq!(empty.content(), "[]");
    }
}
