//! Room membership reconciliation.
//!
//! Before a homeserver's view of a room can be read, the session's user has to
//! be joined to it. A failed join is not fatal: the session is simply
//! unreachable for that room in this run.

use tracing::{debug, info, warn};

use super::session::{EndpointSession, with_timeout};
use crate::metrics;
use crate::room::RoomId;

/// Result of [`ensure_joined`] for one (session, room) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipStatus {
    /// The room was already in the session's joined set; no request was made.
    AlreadyJoined,
    /// The room was joined during this call.
    Joined,
    /// The join request failed; the reason is kept for the report.
    JoinFailed(String),
}

impl MembershipStatus {
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::AlreadyJoined | Self::Joined)
    }
}

/// Make sure the session's user is joined to `room_id`.
///
/// Idempotent: a room already in the joined set is never joined again, and
/// overlapping calls for the same room share one join request. A failed join
/// is remembered for the rest of the run and not retried.
pub async fn ensure_joined(session: &EndpointSession, room_id: &RoomId) -> MembershipStatus {
    if session.is_joined(room_id) {
        debug!(endpoint = %session.endpoint(), room = %room_id, "Already joined");
        return MembershipStatus::AlreadyJoined;
    }

    let attempt = session.join_attempt(room_id);
    let mut requested = false;
    let flag = &mut requested;
    let result = attempt
        .get_or_init(|| async move {
            *flag = true;
            join(session, room_id).await
        })
        .await;

    match result {
        Ok(()) if requested => MembershipStatus::Joined,
        Ok(()) => MembershipStatus::AlreadyJoined,
        Err(reason) => MembershipStatus::JoinFailed(reason.clone()),
    }
}

async fn join(session: &EndpointSession, room_id: &RoomId) -> Result<(), String> {
    let result = with_timeout(
        session.request_timeout(),
        session.client().join_room(room_id),
    )
    .await;

    match result {
        Ok(()) => {
            session.mark_joined(room_id.clone());
            metrics::record_join(session.endpoint(), "joined");
            info!(
                endpoint = %session.endpoint(),
                identity = %session.identity(),
                room = %room_id,
                "Joined room"
            );
            Ok(())
        }
        Err(e) => {
            metrics::record_join(session.endpoint(), "failed");
            warn!(
                endpoint = %session.endpoint(),
                identity = %session.identity(),
                room = %room_id,
                error = %e,
                error_code = e.error_code(),
                "Couldn't join room"
            );
            Err(e.to_string())
        }
    }
}
