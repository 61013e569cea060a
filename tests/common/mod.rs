//! Integration test common infrastructure.
//!
//! Provides an in-process fake Matrix homeserver and helpers for pointing
//! roomdiff at it.

pub mod homeserver;

#[allow(unused_imports)]
pub use homeserver::FakeHomeserver;

use roomdiff::client::{HomeserverClient, MatrixClient};
use roomdiff::config::{HomeserverConfig, TimeoutsConfig};
use std::sync::Arc;

/// A real client for a fake homeserver.
#[allow(dead_code)]
pub fn client_for(server: &FakeHomeserver) -> Arc<dyn HomeserverClient> {
    let config = HomeserverConfig {
        url: server.url(),
        access_token: server.token().to_string(),
        name: None,
    };
    Arc::new(MatrixClient::new(&config, &TimeoutsConfig::default()).expect("client"))
}
