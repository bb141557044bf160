//! Device status reporting.
//!
//! [`DeviceStatusService`] answers the platform's status requests through a
//! caller-supplied handler, publishes status responses and updates, and keeps
//! the transport's last will in sync with the set of known devices.

pub mod model;
pub mod service;

pub use model::{DeviceStatus, DeviceStatusReport};
pub use service::{DeviceStatusService, StatusRequestHandler};

/// Source of the current status of a device.
pub trait DeviceStatusProvider: Send + Sync {
    fn device_status(&self, device_key: &str) -> DeviceStatus;
}
