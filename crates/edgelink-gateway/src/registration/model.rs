//! Sub-device registration types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to register a sub-device with the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdeviceRegistrationRequest {
    #[serde(rename = "name")]
    pub device_name: String,
    pub device_key: String,
    /// Device template, passed through as-is
    #[serde(default)]
    pub template: Value,
    #[serde(default)]
    pub default_binding: bool,
}

impl SubdeviceRegistrationRequest {
    pub fn new(device_name: impl Into<String>, device_key: impl Into<String>, template: Value) -> Self {
        Self {
            device_name: device_name.into(),
            device_key: device_key.into(),
            template,
            default_binding: false,
        }
    }

    pub fn with_default_binding(mut self, default_binding: bool) -> Self {
        self.default_binding = default_binding;
        self
    }
}

/// Request to update the assets of a registered sub-device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdeviceUpdateRequest {
    pub device_key: String,
    #[serde(default)]
    pub update_default_semantics: bool,
    /// Sensors, actuators, alarms and configurations to add or change
    #[serde(default)]
    pub assets: Value,
}

impl SubdeviceUpdateRequest {
    pub fn new(device_key: impl Into<String>, update_default_semantics: bool, assets: Value) -> Self {
        Self {
            device_key: device_key.into(),
            update_default_semantics,
            assets,
        }
    }
}

/// Platform outcome of a registration or update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformResultCode {
    Ok,
    ErrorGatewayNotFound,
    ErrorNotAGateway,
    ErrorKeyConflict,
    ErrorMaximumNumberOfDevicesExceeded,
    ErrorValidationError,
    ErrorInvalidDto,
    ErrorKeyMissing,
    ErrorSubdeviceManagementForbidden,
    ErrorUnknown,
}

impl PlatformResultCode {
    /// Parse a wire code. Unrecognized codes map to [`Self::ErrorUnknown`].
    pub fn from_wire(code: &str) -> Self {
        serde_json::from_value(Value::String(code.to_string())).unwrap_or(Self::ErrorUnknown)
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub code: PlatformResultCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PlatformResult {
    pub fn new(code: PlatformResultCode) -> Self {
        Self {
            code,
            description: None,
        }
    }
}

/// Decoded platform response to a registration or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub result: PlatformResult,
}

/// Which request family a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Registration,
    Update,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// A published request still waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub device_key: String,
    pub kind: RequestKind,
    pub requested_at: DateTime<Utc>,
}
