//! Report output and metrics export configuration.

use serde::Deserialize;
use std::path::PathBuf;

use super::defaults::default_true;

/// How room reports are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary lines.
    #[default]
    Text,
    /// One JSON object per room, newline-delimited.
    Json,
}

/// Report output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Output format (default: text).
    #[serde(default)]
    pub format: OutputFormat,
    /// List every extra event in text output, not just the counts (default: true).
    #[serde(default = "default_true")]
    pub list_extra_events: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            list_extra_events: true,
        }
    }
}

/// Prometheus textfile export, for node_exporter's textfile collector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Where to write the `.prom` file at the end of a run.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}
