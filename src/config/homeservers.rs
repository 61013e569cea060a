//! Homeserver endpoint configuration.

use serde::Deserialize;

/// One homeserver whose view of the requested rooms is compared.
#[derive(Clone, Deserialize)]
pub struct HomeserverConfig {
    /// Base URL of the client-server API (e.g., "https://matrix.example.org").
    pub url: String,
    /// Access token for the account used to inspect rooms.
    #[serde(alias = "accessToken")]
    pub access_token: String,
    /// Optional short label used in logs instead of the URL.
    #[serde(default)]
    pub name: Option<String>,
}

impl HomeserverConfig {
    /// Label for logs: the configured name, falling back to the URL.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

// Access tokens stay out of logs and panics.
impl std::fmt::Debug for HomeserverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeserverConfig")
            .field("url", &self.url)
            .field("access_token", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}
