//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{default_connect_timeout, default_request_timeout};
use super::homeservers::HomeserverConfig;
use super::output::{MetricsConfig, OutputConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Homeservers whose room state is compared.
    #[serde(default)]
    pub homeservers: Vec<HomeserverConfig>,
    /// Network timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Report output.
    #[serde(default)]
    pub output: OutputConfig,
    /// Optional metrics export.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// `.json` files are read as JSON, everything else as TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Config = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(config)
    }
}

/// Per-request network timeouts.
///
/// Every homeserver call is bounded so that one unresponsive server cannot
/// stall the run. A timed-out call is treated like any other failed call.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Seconds allowed for a single request, end to end (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_secs: u64,

    /// Seconds allowed for TCP/TLS connection setup (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_timeout(),
            connect_secs: default_connect_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}
