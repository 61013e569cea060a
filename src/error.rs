//! Unified error handling for roomdiff.
//!
//! Two layers: [`ClientError`] for a single homeserver call, which the
//! reconciliation pipeline turns into per-session data, and [`StartupError`]
//! for the failures that abort the whole run.

use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, ValidationError};

// ============================================================================
// Client Errors (one homeserver request)
// ============================================================================

/// Errors returned by a [`HomeserverClient`](crate::client::HomeserverClient).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("homeserver returned {status} ({errcode}): {message}")]
    Http {
        status: u16,
        errcode: String,
        message: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Get a static error code string for log and metric labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "request_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Http { .. } => "http_error",
            Self::Decode(_) => "decode_error",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Timeout(_) => "timeout",
        }
    }
}

// ============================================================================
// Startup Errors (abort the run)
// ============================================================================

/// Failures that stop the run before any room is processed.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("invalid config: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("failed to access homeserver {endpoint}: {source}")]
    EndpointInit {
        endpoint: String,
        #[source]
        source: ClientError,
    },
}

impl StartupError {
    /// Stable code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::Validation(_) => "invalid_config",
            Self::EndpointInit { source, .. } => source.error_code(),
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
