//! Room state fetching.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::membership::{MembershipStatus, ensure_joined};
use super::session::{EndpointSession, with_timeout};
use crate::error::ClientError;
use crate::metrics;
use crate::room::{RoomId, StateEvent};

/// What one session contributed to a room check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Joined and fetched; carries the session's state events.
    Joined { events: Vec<StateEvent> },
    /// The join failed; the session is unreachable for this room.
    JoinFailed { reason: String },
    /// Joined, but the state fetch failed; also unreachable.
    FetchFailed { reason: String },
}

impl SessionOutcome {
    pub fn events(&self) -> Option<&[StateEvent]> {
        match self {
            Self::Joined { events } => Some(events),
            Self::JoinFailed { .. } | Self::FetchFailed { .. } => None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.events().is_some()
    }

    /// Human-readable reason for an unreachable session.
    pub fn failure(&self) -> Option<String> {
        match self {
            Self::Joined { .. } => None,
            Self::JoinFailed { reason } => Some(format!("join failed: {}", reason)),
            Self::FetchFailed { reason } => Some(format!("state fetch failed: {}", reason)),
        }
    }
}

/// Fetch the current state of a room the session has joined.
///
/// Duplicate event IDs in the response are dropped, keeping the first.
pub async fn fetch_state(
    session: &EndpointSession,
    room_id: &RoomId,
) -> Result<Vec<StateEvent>, ClientError> {
    let events = with_timeout(
        session.request_timeout(),
        session.client().room_state(room_id),
    )
    .await?;

    let received = events.len();
    let mut seen = HashSet::with_capacity(received);
    let events: Vec<StateEvent> = events
        .into_iter()
        .filter(|e| seen.insert(e.event_id.clone()))
        .collect();

    if events.len() != received {
        warn!(
            endpoint = %session.endpoint(),
            room = %room_id,
            duplicates = received - events.len(),
            "Homeserver returned duplicate state event IDs"
        );
    }

    debug!(
        endpoint = %session.endpoint(),
        room = %room_id,
        count = events.len(),
        "Fetched room state"
    );
    Ok(events)
}

/// Join (if needed) and then fetch, in that order, for one session.
///
/// Failures become data: the returned outcome says whether the session's view
/// of the room is available and why not.
pub async fn collect_outcome(session: &EndpointSession, room_id: &RoomId) -> SessionOutcome {
    if let MembershipStatus::JoinFailed(reason) = ensure_joined(session, room_id).await {
        return SessionOutcome::JoinFailed { reason };
    }

    match fetch_state(session, room_id).await {
        Ok(events) => SessionOutcome::Joined { events },
        Err(e) => {
            metrics::record_fetch_failure(session.endpoint());
            warn!(
                endpoint = %session.endpoint(),
                identity = %session.identity(),
                room = %room_id,
                error = %e,
                error_code = e.error_code(),
                "Couldn't fetch room state"
            );
            SessionOutcome::FetchFailed {
                reason: e.to_string(),
            }
        }
    }
}
