//! N-way room state comparison.
//!
//! Each reachable session's state is reduced to its set of event IDs. An event
//! is *extra* for a session when the session holds it but at least one other
//! reachable session does not. For two sessions this is the plain symmetric
//! difference; for more it never lets a majority outvote a minority, so every
//! holder of a partially replicated event is reported.
//!
//! Payloads are never compared: two events with the same ID are the same
//! event, whatever their content.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::fetch::SessionOutcome;
use super::session::{home_domain, key_identity};
use crate::room::{RoomId, StateEvent};

/// How many sessions could be read for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    All,
    Partial,
    None,
}

/// Whether the reachable sessions agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    InSync,
    Diverged,
    /// Fewer than two sessions were reachable; nothing to compare.
    NotCompared,
}

/// Overall verdict for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    InSync,
    Diverged,
    PartialReachability,
    TotallyUnreachable,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InSync => "in_sync",
            Self::Diverged => "diverged",
            Self::PartialReachability => "partial_reachability",
            Self::TotallyUnreachable => "totally_unreachable",
        }
    }
}

/// One session's part of a [`DivergenceReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDiff {
    /// The user ID behind the session.
    pub identity: String,
    pub home_domain: String,
    pub unreachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub state_event_count: usize,
    /// Events this session holds that some other reachable session lacks.
    pub extra_events: Vec<StateEvent>,
    /// Event IDs other reachable sessions hold that this session lacks.
    pub missing_event_ids: Vec<String>,
}

/// Comparison result for one room across all sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceReport {
    pub room_id: RoomId,
    pub classification: Classification,
    pub reachability: Reachability,
    pub agreement: Agreement,
    /// Events held by every reachable session.
    pub common_event_count: usize,
    /// Per-session results keyed by session key: the user ID, with the
    /// endpoint appended when several homeservers share that user ID.
    pub sessions: BTreeMap<String, SessionDiff>,
}

impl DivergenceReport {
    /// Session keys holding at least one extra event.
    pub fn diverged_identities(&self) -> impl Iterator<Item = &str> {
        self.sessions
            .iter()
            .filter(|(_, s)| !s.extra_events.is_empty())
            .map(|(identity, _)| identity.as_str())
    }

    pub fn unreachable_identities(&self) -> impl Iterator<Item = &str> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.unreachable)
            .map(|(identity, _)| identity.as_str())
    }

    /// Anything other than a fully reachable, in-sync room.
    pub fn needs_attention(&self) -> bool {
        self.classification != Classification::InSync
    }
}

/// Compare the sessions' views of a room, keyed by session key.
pub fn diff(room_id: &RoomId, outcomes: BTreeMap<String, SessionOutcome>) -> DivergenceReport {
    let reachable_count = outcomes.values().filter(|o| o.is_reachable()).count();
    let comparable = reachable_count >= 2;

    // event ID -> number of reachable sessions holding it
    let mut holders: HashMap<String, usize> = HashMap::new();
    for events in outcomes.values().filter_map(SessionOutcome::events) {
        for event in events {
            *holders.entry(event.event_id.clone()).or_default() += 1;
        }
    }
    let common_event_count = holders.values().filter(|&&n| n == reachable_count).count();

    let mut sessions = BTreeMap::new();
    for (key, outcome) in outcomes {
        let identity = key_identity(&key).to_string();
        let domain = home_domain(&identity).to_string();
        let failure = outcome.failure();
        let session = match outcome {
            SessionOutcome::Joined { events } => {
                let held: HashSet<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
                let mut missing_event_ids: Vec<String> = if comparable {
                    holders
                        .keys()
                        .filter(|id| !held.contains(id.as_str()))
                        .cloned()
                        .collect()
                } else {
                    Vec::new()
                };
                missing_event_ids.sort();

                let state_event_count = events.len();
                let extra_events: Vec<StateEvent> = if comparable {
                    events
                        .into_iter()
                        .filter(|e| holders.get(&e.event_id).copied().unwrap_or(0) < reachable_count)
                        .collect()
                } else {
                    Vec::new()
                };

                SessionDiff {
                    identity,
                    home_domain: domain,
                    unreachable: false,
                    failure: None,
                    state_event_count,
                    extra_events,
                    missing_event_ids,
                }
            }
            SessionOutcome::JoinFailed { .. } | SessionOutcome::FetchFailed { .. } => SessionDiff {
                identity,
                home_domain: domain,
                unreachable: true,
                failure,
                state_event_count: 0,
                extra_events: Vec::new(),
                missing_event_ids: Vec::new(),
            },
        };
        sessions.insert(key, session);
    }

    let reachability = if reachable_count == 0 {
        Reachability::None
    } else if reachable_count == sessions.len() {
        Reachability::All
    } else {
        Reachability::Partial
    };

    let agreement = if !comparable {
        Agreement::NotCompared
    } else if sessions.values().any(|s| !s.extra_events.is_empty()) {
        Agreement::Diverged
    } else {
        Agreement::InSync
    };

    let classification = match (reachability, agreement) {
        (Reachability::None, _) => Classification::TotallyUnreachable,
        (Reachability::Partial, _) => Classification::PartialReachability,
        (Reachability::All, Agreement::Diverged) => Classification::Diverged,
        (Reachability::All, _) => Classification::InSync,
    };

    DivergenceReport {
        room_id: room_id.clone(),
        classification,
        reachability,
        agreement,
        common_event_count,
        sessions,
    }
}
