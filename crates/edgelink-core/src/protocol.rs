//! Protocol and listener abstractions.
//!
//! A [`Protocol`] describes one message family: which channels it listens on
//! and how the originating device key is recovered from a channel. Family
//! specific encode/decode lives in traits extending [`Protocol`].
//!
//! A [`MessageListener`] is anything the router can deliver messages to.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;

/// Channel level separator.
pub const CHANNEL_DELIMITER: char = '/';

/// Marker segment preceding the device key in a channel.
pub const DEVICE_PATH_PREFIX: &str = "d";

/// Single-level wildcard.
pub const CHANNEL_SINGLE_LEVEL_WILDCARD: &str = "+";

/// Multi-level wildcard.
pub const CHANNEL_MULTI_LEVEL_WILDCARD: &str = "#";

/// A message family codec.
pub trait Protocol: Send + Sync {
    /// Protocol name, used in logs.
    fn name(&self) -> &str;

    /// Channels (or channel patterns) this protocol expects inbound traffic on.
    fn inbound_channels(&self) -> Vec<String>;

    /// Recover the device key from a channel.
    ///
    /// Returns `None` for malformed channels.
    fn extract_device_key(&self, channel: &str) -> Option<String> {
        device_key_from_channel(channel)
    }
}

/// View of a protocol object as a plain [`Protocol`].
///
/// Implemented for every sized protocol, so family traits can require it and
/// still hand out `&dyn Protocol` from behind their own trait objects.
pub trait AsProtocol {
    fn as_protocol(&self) -> &dyn Protocol;
}

impl<T: Protocol> AsProtocol for T {
    fn as_protocol(&self) -> &dyn Protocol {
        self
    }
}

/// Receiver of routed messages.
#[async_trait]
pub trait MessageListener: Send + Sync {
    /// Protocol that decides which channels this listener owns.
    fn protocol(&self) -> &dyn Protocol;

    /// Handle a message routed to this listener.
    async fn message_received(&self, message: Message) -> Result<()>;
}

/// Extract the device key from a `<root>/d/<device_key>[/...]` channel.
///
/// The key is the segment right after the last `d` marker that is followed
/// by a non-empty, non-wildcard segment.
pub fn device_key_from_channel(channel: &str) -> Option<String> {
    let parts: Vec<&str> = channel.split(CHANNEL_DELIMITER).collect();

    parts
        .windows(2)
        .rev()
        .find(|pair| {
            pair[0] == DEVICE_PATH_PREFIX
                && !pair[1].is_empty()
                && pair[1] != CHANNEL_SINGLE_LEVEL_WILDCARD
                && pair[1] != CHANNEL_MULTI_LEVEL_WILDCARD
        })
        .map(|pair| pair[1].to_string())
}

/// Build `<root>/d/<device_key>`.
pub fn device_channel(root: &str, device_key: &str) -> String {
    format!(
        "{}{}{}{}{}",
        root.trim_end_matches(CHANNEL_DELIMITER),
        CHANNEL_DELIMITER,
        DEVICE_PATH_PREFIX,
        CHANNEL_DELIMITER,
        device_key
    )
}
