//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use reqwest::Url;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("at least one homeserver must be configured")]
    NoHomeservers,
    #[error("homeservers[{index}].url is not a valid URL: {url}")]
    InvalidUrl { index: usize, url: String },
    #[error("homeservers[{index}].url must use http or https, got '{scheme}'")]
    UnsupportedScheme { index: usize, scheme: String },
    #[error("homeservers[{0}].access_token is empty")]
    EmptyAccessToken(usize),
    #[error("homeserver {0} is configured more than once")]
    DuplicateUrl(String),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.homeservers.is_empty() {
        errors.push(ValidationError::NoHomeservers);
    }

    let mut seen = HashSet::new();
    for (index, hs) in config.homeservers.iter().enumerate() {
        match Url::parse(&hs.url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    errors.push(ValidationError::UnsupportedScheme {
                        index,
                        scheme: url.scheme().to_string(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidUrl {
                index,
                url: hs.url.clone(),
            }),
        }

        if hs.access_token.trim().is_empty() {
            errors.push(ValidationError::EmptyAccessToken(index));
        }

        let normalized = hs.url.trim_end_matches('/').to_ascii_lowercase();
        if !seen.insert(normalized) {
            errors.push(ValidationError::DuplicateUrl(hs.url.clone()));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
