//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Timeout Defaults
// =============================================================================

/// Seconds allowed for a single homeserver request.
pub fn default_request_timeout() -> u64 {
    30
}

/// Seconds allowed for establishing a TCP/TLS connection.
pub fn default_connect_timeout() -> u64 {
    10
}

// =============================================================================
// CLI Defaults
// =============================================================================

/// Config path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
