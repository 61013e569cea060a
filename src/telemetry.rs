//! Logging setup and standard spans.

use tracing_subscriber::EnvFilter;

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Logs go to stderr so
/// stdout carries only reports.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for a whole run.
    pub fn run(run_id: &str) -> Span {
        info_span!("run", run_id = %run_id)
    }

    /// Span for checking one room across all homeservers.
    pub fn room(room_id: &str) -> Span {
        info_span!("room", room = %room_id)
    }

    /// Span for one homeserver session's work.
    pub fn endpoint(endpoint: &str, identity: Option<&str>) -> Span {
        if let Some(identity) = identity {
            info_span!("endpoint", endpoint = %endpoint, identity = %identity)
        } else {
            info_span!("endpoint", endpoint = %endpoint)
        }
    }
}
