//! Gateway configuration.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`edgelink.toml` by convention)
//! 3. Environment variables (see [`env_vars`])

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "edgelink.toml";

/// Default log filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable names.
pub mod env_vars {
    pub const LOG_LEVEL: &str = "EDGELINK_LOG_LEVEL";
    pub const LOG_JSON: &str = "EDGELINK_LOG_JSON";
    pub const DOWNLOAD_DIR: &str = "EDGELINK_DOWNLOAD_DIR";
}

/// Top level gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub logging: LoggingConfig,
    pub firmware: FirmwareConfig,
    pub registration: RegistrationConfig,
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of the compact human format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

/// Firmware update settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    /// Where downloaded firmware files are stored
    pub download_dir: PathBuf,
    /// Publish the device firmware version after a successful install
    pub publish_version_on_completion: bool,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            download_dir: std::env::temp_dir().join("edgelink-firmware"),
            publish_version_on_completion: true,
        }
    }
}

/// Sub-device registration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Publish registration requests for known devices on start
    pub register_on_start: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            register_on_start: true,
        }
    }
}

impl GatewayConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load from a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(env_vars::LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }

        if let Some(json) = lookup(env_vars::LOG_JSON).and_then(|v| v.parse().ok()) {
            self.logging.json = json;
        }

        if let Some(dir) = lookup(env_vars::DOWNLOAD_DIR).filter(|v| !v.is_empty()) {
            self.firmware.download_dir = PathBuf::from(dir);
        }
    }
}
