//! Homeserver client abstraction.
//!
//! The reconciliation pipeline only talks to homeservers through
//! [`HomeserverClient`]; [`matrix::MatrixClient`] is the production
//! implementation over the client-server HTTP API.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::ClientError;
use crate::room::{RoomId, StateEvent};

pub mod matrix;
#[cfg(test)]
pub(crate) mod mock;

pub use matrix::MatrixClient;

#[async_trait]
pub trait HomeserverClient: Send + Sync {
    /// Base URL of the homeserver, used for logging.
    fn endpoint(&self) -> &str;

    /// Resolve the user ID the access token belongs to.
    async fn whoami(&self) -> Result<String, ClientError>;

    /// List the rooms the user is currently joined to.
    async fn joined_rooms(&self) -> Result<HashSet<RoomId>, ClientError>;

    /// Join a room.
    async fn join_room(&self, room_id: &RoomId) -> Result<(), ClientError>;

    /// Fetch the current state events of a joined room.
    async fn room_state(&self, room_id: &RoomId) -> Result<Vec<StateEvent>, ClientError>;
}
