//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `linking.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use linking_adapter_btleplug::BtleplugConfig;
use linking_app::{ConnectionConfig, DiscoveryConfig};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Radio selection.
    pub bluetooth: BtleplugConfig,
    /// Device discovery.
    pub discovery: DiscoveryConfig,
    /// Per-device connection tuning.
    pub connection: ConnectionConfig,
    /// What to do with the devices found.
    pub session: SessionConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Behavior after discovery.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Connect to the first device found and log its events until Ctrl-C.
    pub connect: bool,
}

impl Config {
    /// Load configuration from `linking.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("linking.toml")?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("LINKING_NAME_FILTER") {
            self.discovery.name_filter = Some(val).filter(|name| !name.is_empty());
        }
        if let Some(val) = var("LINKING_ID_FILTER") {
            self.discovery.id_filter = Some(val).filter(|id| !id.is_empty());
        }
        if let Some(ms) = var("LINKING_SCAN_MS").and_then(|val| val.parse().ok()) {
            self.discovery.duration_ms = ms;
        }
        if let Some(val) = var("LINKING_ADAPTER") {
            self.bluetooth.adapter = Some(val);
        }
        if let Some(val) = var("LINKING_CONNECT") {
            self.session.connect = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Some(val) = var("LINKING_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.connect_attempts == 0 {
            return Err(ConfigError::Validation(
                "connect_attempts must be non-zero".to_string(),
            ));
        }
        if self.connection.response_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "response_timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "linkingd=info,linking_app=info,linking_adapter_btleplug=info".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { connect: true }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
