//! Device status types.

use serde::{Deserialize, Serialize};

/// Connection state of a device as seen by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Connected,
    Sleep,
    Service,
    Offline,
}

/// Status of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatusReport {
    pub device_key: String,
    pub status: DeviceStatus,
}

impl DeviceStatusReport {
    pub fn new(device_key: impl Into<String>, status: DeviceStatus) -> Self {
        Self {
            device_key: device_key.into(),
            status,
        }
    }
}
