//! JSON sub-device registration protocol.
//!
//! Requests go out on `d2p/subdevice_registration/d/<key>` and
//! `d2p/subdevice_update/d/<key>`; the platform answers on the matching
//! `p2d/...` channels with `{"result":"OK","description":"..."}`.

use edgelink_core::protocol::CHANNEL_SINGLE_LEVEL_WILDCARD;
use edgelink_core::{device_channel, topic_matches, Error, Message, Protocol, Result};
use serde::Deserialize;

use super::RegistrationProtocol;
use crate::registration::model::{
    PlatformResult, PlatformResultCode, RegistrationResponse, SubdeviceRegistrationRequest,
    SubdeviceUpdateRequest,
};

pub const REGISTRATION_REQUEST_ROOT: &str = "d2p/subdevice_registration";
pub const REGISTRATION_RESPONSE_ROOT: &str = "p2d/subdevice_registration";
pub const UPDATE_REQUEST_ROOT: &str = "d2p/subdevice_update";
pub const UPDATE_RESPONSE_ROOT: &str = "p2d/subdevice_update";

#[derive(Deserialize)]
struct ResponsePayload {
    result: String,
    #[serde(default)]
    description: Option<String>,
}

/// JSON codec for registration and update requests/responses.
#[derive(Debug, Clone)]
pub struct JsonRegistrationProtocol {
    registration_response_pattern: String,
    update_response_pattern: String,
}

impl JsonRegistrationProtocol {
    pub fn new() -> Self {
        Self {
            registration_response_pattern: device_channel(
                REGISTRATION_RESPONSE_ROOT,
                CHANNEL_SINGLE_LEVEL_WILDCARD,
            ),
            update_response_pattern: device_channel(
                UPDATE_RESPONSE_ROOT,
                CHANNEL_SINGLE_LEVEL_WILDCARD,
            ),
        }
    }
}

impl Default for JsonRegistrationProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for JsonRegistrationProtocol {
    fn name(&self) -> &str {
        "json-registration"
    }

    fn inbound_channels(&self) -> Vec<String> {
        vec![
            self.registration_response_pattern.clone(),
            self.update_response_pattern.clone(),
        ]
    }
}

impl RegistrationProtocol for JsonRegistrationProtocol {
    fn is_registration_response(&self, message: &Message) -> bool {
        topic_matches(&self.registration_response_pattern, message.channel())
    }

    fn is_update_response(&self, message: &Message) -> bool {
        topic_matches(&self.update_response_pattern, message.channel())
    }

    fn make_registration_response(&self, message: &Message) -> Result<RegistrationResponse> {
        let payload: ResponsePayload = serde_json::from_str(message.content()).map_err(|e| {
            Error::Decode(format!(
                "Invalid registration response on '{}': {}",
                message.channel(),
                e
            ))
        })?;

        Ok(RegistrationResponse {
            result: PlatformResult {
                code: PlatformResultCode::from_wire(&payload.result),
                description: payload.description.filter(|d| !d.is_empty()),
            },
        })
    }

    fn make_registration_request_message(
        &self,
        request: &SubdeviceRegistrationRequest,
    ) -> Result<Message> {
        if request.device_key.is_empty() {
            return Err(Error::Encode("Registration request without device key".to_string()));
        }

        let content = serde_json::to_string(request)
            .map_err(|e| Error::Encode(format!("Registration request: {}", e)))?;

        Ok(Message::new(
            device_channel(REGISTRATION_REQUEST_ROOT, &request.device_key),
            content,
        ))
    }

    fn make_update_request_message(&self, request: &SubdeviceUpdateRequest) -> Result<Message> {
        if request.device_key.is_empty() {
            return Err(Error::Encode("Update request without device key".to_string()));
        }

        let content = serde_json::to_string(request)
            .map_err(|e| Error::Encode(format!("Update request: {}", e)))?;

        Ok(Message::new(
            device_channel(UPDATE_REQUEST_ROOT, &request.device_key),
            content,
        ))
    }
}
