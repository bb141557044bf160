//! Sub-device registration.

pub mod model;
pub mod service;

pub use model::{
    PendingRequest, PlatformResult, PlatformResultCode, RegistrationResponse, RequestKind,
    SubdeviceRegistrationRequest, SubdeviceUpdateRequest,
};
pub use service::{DeviceRegistrationService, ResponseHandler};
