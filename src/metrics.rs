//! Prometheus metrics for roomdiff runs.
//!
//! roomdiff is a one-shot tool, so instead of serving `/metrics` the registry
//! is rendered once at the end of a run and written to a file for
//! node_exporter's textfile collector.
//!
//! - `roomdiff_rooms_checked_total{classification}` - Rooms checked by outcome
//! - `roomdiff_joins_total{endpoint,result}` - Join attempts per homeserver
//! - `roomdiff_state_fetch_failures_total{endpoint}` - Failed state fetches
//! - `roomdiff_extra_events{room,identity}` - Extra state events per session

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::path::Path;
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Rooms checked, labeled by classification.
pub static ROOMS_CHECKED: OnceLock<IntCounterVec> = OnceLock::new();

/// Join attempts, labeled by homeserver and result.
pub static JOINS: OnceLock<IntCounterVec> = OnceLock::new();

/// State fetches that failed after a successful join.
pub static STATE_FETCH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Extra state events per room and session at the end of the run.
pub static EXTRA_EVENTS: OnceLock<IntGaugeVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; only the first call registers anything.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(ROOMS_CHECKED, IntCounterVec::new(Opts::new("roomdiff_rooms_checked_total", "Rooms checked by classification"), &["classification"]));
    register!(JOINS, IntCounterVec::new(Opts::new("roomdiff_joins_total", "Room join attempts by homeserver and result"), &["endpoint", "result"]));
    register!(STATE_FETCH_FAILURES, IntCounterVec::new(Opts::new("roomdiff_state_fetch_failures_total", "Failed room state fetches by homeserver"), &["endpoint"]));
    register!(EXTRA_EVENTS, IntGaugeVec::new(Opts::new("roomdiff_extra_events", "State events held by one homeserver but not all others"), &["room", "identity"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

/// Write the current metrics to `path`.
///
/// Writes to a sibling temp file and renames it into place so the collector
/// never reads a half-written file.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, gather_metrics())?;
    std::fs::rename(&tmp, path)
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record a finished room check.
#[inline]
pub fn record_room(classification: &str) {
    if let Some(c) = ROOMS_CHECKED.get() {
        c.with_label_values(&[classification]).inc();
    }
}

/// Record a join attempt.
#[inline]
pub fn record_join(endpoint: &str, result: &str) {
    if let Some(c) = JOINS.get() {
        c.with_label_values(&[endpoint, result]).inc();
    }
}

/// Record a failed state fetch.
#[inline]
pub fn record_fetch_failure(endpoint: &str) {
    if let Some(c) = STATE_FETCH_FAILURES.get() {
        c.with_label_values(&[endpoint]).inc();
    }
}

/// Set the extra event count for one session in one room.
#[inline]
pub fn set_extra_events(room: &str, identity: &str, count: usize) {
    if let Some(g) = EXTRA_EVENTS.get() {
        g.with_label_values(&[room, identity]).set(count as i64);
    }
}
