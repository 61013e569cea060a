//! roomdiff - compare Matrix room state across homeservers.
//!
//! Given a set of homeservers (each with an access token) and a set of room
//! IDs, roomdiff makes sure every account is joined to every room, fetches
//! each homeserver's current room state and reports the state events that
//! only some homeservers hold. It is meant for operators chasing split-brain
//! or replication lag in federated deployments.
//!
//! The pipeline lives in [`reconcile`]; homeservers are reached through the
//! [`client::HomeserverClient`] trait.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod report;
pub mod room;
pub mod telemetry;

pub use error::{ClientError, StartupError};
pub use reconcile::{DivergenceReport, RunOutcome, run};
pub use room::{RoomId, StateEvent};
