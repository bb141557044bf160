//! Transport boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;

/// Outbound side of the publish/subscribe transport.
///
/// Implementations own the network connection; the gateway only publishes
/// through it and tells it which channels to subscribe to.
#[async_trait]
pub trait ConnectivityService: Send + Sync {
    /// Publish a message. No retry is implied.
    async fn publish(&self, message: Message) -> Result<()>;

    /// Subscribe to the given channels (patterns allowed).
    async fn subscribe(&self, channels: &[String]) -> Result<()>;

    /// Message the broker publishes on the gateway's behalf if the connection
    /// drops uncleanly. Replaces any previous one.
    ///
    /// Transports without last-will support keep this default.
    async fn set_last_will(&self, message: Message) -> Result<()> {
        tracing::debug!(
            "Transport has no last will support, ignoring message for {}",
            message.channel()
        );
        Ok(())
    }
}
