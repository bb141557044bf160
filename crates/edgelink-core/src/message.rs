//! Transport-level message value.

use serde::{Deserialize, Serialize};

/// A message as delivered by (or handed to) the publish/subscribe transport.
///
/// Messages are immutable once built; whoever holds one owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    channel: String,
    content: String,
}

impl Message {
    /// Create a new message for a channel.
    pub fn new(channel: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            content: content.into(),
        }
    }

    /// Channel the message was received on, or is destined for.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Raw payload.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Split into channel and content.
    pub fn into_parts(self) -> (String, String) {
        (self.channel, self.content)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel: {}, content: {}", self.channel, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accessors() {
        let message = Message::new("p2d/firmware_update/d/dev1", r#"{"command":"ABORT"}"#);

        assert_eq!(message.channel(), "p2d/firmware_update/d/dev1");
        assert_eq!(message.content(), r#"{"command":"ABORT"}"#);
        assert_eq!(
            message.to_string(),
            r#"channel: p2d/firmware_update/d/dev1, content: {"command":"ABORT"}"#
        );

        let (channel, content) = message.into_parts();
        assert_eq!(channel, "p2d/firmware_update/d/dev1");
        assert_eq!(content, r#"{"command":"ABORT"}"#);
    }

    #[test]
    fn test_message_serialization() {
        let message = Message::new("fw/d/dev1", "payload");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"channel": "fw/d/dev1", "content": "payload"})
        );
    }
}
