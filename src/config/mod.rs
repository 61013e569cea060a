//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions and loading (Config, TimeoutsConfig)
//! - [`homeservers`]: Homeserver endpoint descriptors (HomeserverConfig)
//! - [`output`]: Report and metrics output configuration (OutputConfig, MetricsConfig)
//! - [`defaults`]: Serde default value functions
//! - [`validation`]: Startup validation

mod defaults;
mod homeservers;
mod output;
mod types;
pub mod validation;

pub use defaults::DEFAULT_CONFIG_PATH;
pub use homeservers::HomeserverConfig;
pub use output::{MetricsConfig, OutputConfig, OutputFormat};
pub use types::{Config, ConfigError, TimeoutsConfig};
pub use validation::{ValidationError, validate};
