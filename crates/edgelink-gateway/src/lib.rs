//! EdgeLink gateway services.
//!
//! Device-side services built on `edgelink-core`:
//!
//! - **FirmwareUpdateService**: URL download, install and abort of device firmware
//! - **DeviceRegistrationService**: sub-device registration/update requests and
//!   response correlation
//! - **DeviceStatusService**: status requests, status updates and the
//!   transport last will
//! - **JSON protocols** for all three message families
//! - **UrlFileDownloader**: HTTP(S) and local file downloader
//! - **Gateway**: facade wiring the services to a transport
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use edgelink_core::{ConnectivityService, GatewayConfig, Message, Result};
//! use edgelink_gateway::error::InstallError;
//! use edgelink_gateway::firmware::{FirmwareInstaller, FirmwareVersionProvider};
//! use edgelink_gateway::protocol::JsonFirmwareUpdateProtocol;
//! use edgelink_gateway::{Gateway, UrlFileDownloader};
//!
//! struct Transport;
//!
//! #[async_trait]
//! impl ConnectivityService for Transport {
//!     async fn publish(&self, message: Message) -> Result<()> {
//!         println!("{}", message);
//!         Ok(())
//!     }
//!
//!     async fn subscribe(&self, _channels: &[String]) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! struct Installer;
//!
//! #[async_trait]
//! impl FirmwareInstaller for Installer {
//!     async fn install(&self, _device_key: &str, _file: &Path) -> std::result::Result<(), InstallError> {
//!         Ok(())
//!     }
//!
//!     fn abort(&self, _device_key: &str) -> bool {
//!         false
//!     }
//! }
//!
//! struct Versions;
//!
//! impl FirmwareVersionProvider for Versions {
//!     fn firmware_version(&self, _device_key: &str) -> String {
//!         "1.0.0".to_string()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GatewayConfig::from_env();
//!     edgelink_core::init_logging(&config.logging)?;
//!
//!     let gateway = Gateway::builder()
//!         .connectivity(Arc::new(Transport))
//!         .firmware_update(
//!             Arc::new(JsonFirmwareUpdateProtocol::new()),
//!             Arc::new(UrlFileDownloader::from_config(&config.firmware)),
//!             Arc::new(Installer),
//!             Arc::new(Versions),
//!         )
//!         .config(config)
//!         .build()?;
//!
//!     gateway.start().await?;
//!     gateway.message_received(
//!         "p2d/firmware_update/d/dev1",
//!         r#"{"command":"URL_DOWNLOAD","url":"https://example.com/fw.bin"}"#,
//!     )?;
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod downloader;
pub mod error;
pub mod firmware;
pub mod gateway;
pub mod protocol;
pub mod registration;
pub mod status;

pub use downloader::UrlFileDownloader;
pub use error::{DownloadError, InstallError};
pub use firmware::{
    FileDownloader, FirmwareInstaller, FirmwareSessionState, FirmwareUpdateCommand,
    FirmwareUpdateCommandType, FirmwareUpdateErrorCode, FirmwareUpdateResponse,
    FirmwareUpdateService, FirmwareUpdateStatus, FirmwareVersion, FirmwareVersionProvider,
};
pub use gateway::{Gateway, GatewayBuilder};
pub use protocol::{
    FirmwareUpdateProtocol, JsonFirmwareUpdateProtocol, JsonRegistrationProtocol,
    JsonStatusProtocol, RegistrationProtocol, StatusProtocol,
};
pub use registration::{
    DeviceRegistrationService, PendingRequest, PlatformResult, PlatformResultCode,
    RegistrationResponse, RequestKind, SubdeviceRegistrationRequest, SubdeviceUpdateRequest,
};
pub use status::{
    DeviceStatus, DeviceStatusProvider, DeviceStatusReport, DeviceStatusService,
    StatusRequestHandler,
};
