//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a global subscriber
/// is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Configuration(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .try_init()
    };

    result.map_err(|e| Error::Configuration(format!("Failed to install logger: {}", e)))
}
