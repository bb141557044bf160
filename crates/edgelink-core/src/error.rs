//! Error types for the gateway core.

use thiserror::Error;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing, decoding or publishing messages.
#[derive(Debug, Error)]
pub enum Error {
    /// Channel does not carry a recoverable device key.
    #[error("Unable to extract device key from channel: {0}")]
    InvalidChannel(String),

    /// Payload could not be decoded by the owning protocol.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// A domain value could not be encoded into a message.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// The transport refused or failed to publish a message.
    #[error("Publish failed on channel '{channel}': {reason}")]
    Publish { channel: String, reason: String },

    /// Subscribing the transport to the inbound channels failed.
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// The command buffer no longer accepts work.
    #[error(transparent)]
    CommandBuffer(#[from] CommandBufferError),

    /// Invalid or missing configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Build a publish error for the given channel.
    pub fn publish(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

/// Command buffer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandBufferError {
    #[error("Command buffer is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_display() {
        let err = Error::publish("d2p/firmware_update/d/dev1", "not connected");
        assert_eq!(
            err.to_string(),
            "Publish failed on channel 'd2p/firmware_update/d/dev1': not connected"
        );
    }

    #[test]
    fn test_command_buffer_error_converts() {
        let err: Error = CommandBufferError::Closed.into();
        assert!(matches!(err, Error::CommandBuffer(CommandBufferError::Closed)));
        assert_eq!(err.to_string(), "Command buffer is closed");
    }
}
