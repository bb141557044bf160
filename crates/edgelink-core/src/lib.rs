//! EdgeLink gateway core.
//!
//! Inbound dispatch layer shared by all gateway services:
//!
//! - **Message**: immutable channel + payload value
//! - **Protocol / MessageListener**: message family codecs and their consumers
//! - **CommandBuffer**: ordered, single-worker command queue
//! - **InboundMessageHandler**: channel → listener router feeding the buffer
//! - **ConnectivityService**: outbound transport boundary
//!
//! ## Example
//!
//! ```rust,no_run
//! use edgelink_core::{CommandBuffer, InboundMessageHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let buffer = CommandBuffer::new();
//!     let router = InboundMessageHandler::new(buffer.clone());
//!
//!     // Transport callback
//!     router.message_received("p2d/firmware_update/d/dev1", "{}").ok();
//!
//!     buffer.shutdown().await;
//! }
//! ```

pub mod command_buffer;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod logging;
pub mod message;
pub mod protocol;
pub mod router;

pub use command_buffer::{Command, CommandBuffer, CommandBufferStats};
pub use config::{FirmwareConfig, GatewayConfig, LoggingConfig, RegistrationConfig};
pub use connectivity::ConnectivityService;
pub use error::{CommandBufferError, Error, Result};
pub use logging::init_logging;
pub use message::Message;
pub use protocol::{
    device_channel, device_key_from_channel, AsProtocol, MessageListener, Protocol,
};
pub use router::{topic_matches, InboundMessageHandler, ListenerId};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
