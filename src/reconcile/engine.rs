//! Run orchestration.
//!
//! Sessions are connected up front, all or nothing. Rooms are then checked
//! concurrently; inside a room every session joins and fetches concurrently,
//! with the fetch for a session always following its own join attempt.

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, warn};

use super::diff::{Classification, DivergenceReport, diff};
use super::fetch::collect_outcome;
use super::session::EndpointSession;
use crate::client::HomeserverClient;
use crate::error::StartupError;
use crate::metrics;
use crate::room::RoomId;
use crate::telemetry::spans;

/// How a run ended, short of a startup failure.
#[derive(Debug)]
pub enum RunOutcome {
    /// No room IDs were requested.
    NoRooms,
    /// Fewer than two homeservers are configured; there is nothing to compare.
    NotEnoughEndpoints { configured: usize },
    /// Every requested room was checked, reports in completion order.
    Completed(Vec<DivergenceReport>),
}

/// Process exit status when `--fail-on-divergence` is set and a room needs
/// attention.
pub const EXIT_DIVERGED: u8 = 2;

impl RunOutcome {
    /// Exit status for a finished run: 0 unless divergence should fail it.
    pub fn exit_status(&self, fail_on_divergence: bool) -> u8 {
        match self {
            Self::Completed(reports)
                if fail_on_divergence && reports.iter().any(DivergenceReport::needs_attention) =>
            {
                EXIT_DIVERGED
            }
            _ => 0,
        }
    }
}

/// Normalize requested room IDs, dropping duplicates but keeping order.
pub fn normalize_rooms<S: AsRef<str>>(raw: &[S]) -> Vec<RoomId> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(RoomId::new)
        .filter(|room| seen.insert(room.clone()))
        .collect()
}

/// Compares rooms across a fixed set of connected sessions.
pub struct Reconciler {
    sessions: Vec<Arc<EndpointSession>>,
}

impl Reconciler {
    pub fn new(sessions: Vec<Arc<EndpointSession>>) -> Self {
        Self { sessions }
    }

    /// Connect every client; any failure aborts with [`StartupError`].
    pub async fn connect(
        clients: Vec<Arc<dyn HomeserverClient>>,
        request_timeout: Duration,
    ) -> Result<Self, StartupError> {
        let sessions = EndpointSession::connect_all(clients, request_timeout).await?;
        info!(
            identities = ?sessions.iter().map(|s| s.identity()).collect::<Vec<_>>(),
            "Got user IDs and joined rooms"
        );
        Ok(Self::new(sessions))
    }

    pub fn sessions(&self) -> &[Arc<EndpointSession>] {
        &self.sessions
    }

    /// Check one room across every session.
    pub async fn check_room(&self, room_id: &RoomId) -> DivergenceReport {
        info!(room = %room_id, "Checking state");

        let outcomes = join_all(self.sessions.iter().map(|session| {
            let span = spans::endpoint(session.endpoint(), Some(session.identity()));
            async move {
                let outcome = collect_outcome(session, room_id).await;
                (session.key().to_string(), outcome)
            }
            .instrument(span)
        }))
        .await;

        let report = diff(room_id, outcomes.into_iter().collect::<BTreeMap<_, _>>());
        record_report(&report);
        report
    }

    /// Check every room concurrently, handing each report to `on_report` as
    /// soon as it is ready.
    pub async fn check_rooms<F>(&self, rooms: &[RoomId], mut on_report: F) -> Vec<DivergenceReport>
    where
        F: FnMut(&DivergenceReport),
    {
        let mut pending: FuturesUnordered<_> = rooms
            .iter()
            .map(|room| self.check_room(room).instrument(spans::room(room.as_str())))
            .collect();

        let mut reports = Vec::with_capacity(rooms.len());
        while let Some(report) = pending.next().await {
            on_report(&report);
            reports.push(report);
        }
        reports
    }
}

fn record_report(report: &DivergenceReport) {
    metrics::record_room(report.classification.as_str());
    for (key, session) in &report.sessions {
        metrics::set_extra_events(report.room_id.as_str(), key, session.extra_events.len());
    }

    match report.classification {
        Classification::InSync => info!(
            room = %report.room_id,
            common_events = report.common_event_count,
            "Room state in sync"
        ),
        Classification::Diverged => warn!(
            room = %report.room_id,
            diverged = ?report.diverged_identities().collect::<Vec<_>>(),
            "Room state diverged"
        ),
        Classification::PartialReachability => warn!(
            room = %report.room_id,
            unreachable = ?report.unreachable_identities().collect::<Vec<_>>(),
            diverged = ?report.diverged_identities().collect::<Vec<_>>(),
            "Room unreachable on some homeservers"
        ),
        Classification::TotallyUnreachable => warn!(
            room = %report.room_id,
            "Room unreachable on every homeserver"
        ),
    }
}

/// Run a full check.
///
/// The no-op conditions are decided before any network traffic. After that,
/// every client must connect before any room is touched.
pub async fn run<S, F>(
    clients: Vec<Arc<dyn HomeserverClient>>,
    room_ids: &[S],
    request_timeout: Duration,
    on_report: F,
) -> Result<RunOutcome, StartupError>
where
    S: AsRef<str>,
    F: FnMut(&DivergenceReport),
{
    let rooms = normalize_rooms(room_ids);
    if rooms.is_empty() {
        info!("No room IDs specified, not proceeding");
        return Ok(RunOutcome::NoRooms);
    }
    if clients.len() < 2 {
        info!(
            configured = clients.len(),
            "Fewer than two homeservers configured, nothing to compare, not proceeding"
        );
        return Ok(RunOutcome::NotEnoughEndpoints {
            configured: clients.len(),
        });
    }

    let reconciler = Reconciler::connect(clients, request_timeout).await?;
    let reports = reconciler.check_rooms(&rooms, on_report).await;
    Ok(RunOutcome::Completed(reports))
}
