//! Homeserver sessions.
//!
//! A session pairs one [`HomeserverClient`] with the user ID behind its
//! access token and a cache of the rooms that user has joined. Sessions are
//! created once at startup and shared by every room task. Membership is the
//! only mutable state: the joined-room cache and one join cell per room, both
//! behind a per-session lock that is never held across an await.

use futures_util::future::try_join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{Instrument, info, warn};

use crate::client::HomeserverClient;
use crate::error::{ClientError, StartupError};
use crate::room::RoomId;
use crate::telemetry::spans;

/// The domain part of a user ID (`@bot:a.example` -> `a.example`).
///
/// Splits on the first `:` so a port stays with the domain. Returns the input
/// unchanged when there is no separator.
pub fn home_domain(identity: &str) -> &str {
    identity.split_once(':').map_or(identity, |(_, domain)| domain)
}

/// The user ID part of a session key.
///
/// Keys are either a bare user ID or a user ID followed by a space and a
/// disambiguating suffix; user IDs never contain whitespace.
pub fn key_identity(key: &str) -> &str {
    key.split_once(' ').map_or(key, |(identity, _)| identity)
}

/// Run a homeserver call with an upper bound on its duration.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(limit)),
    }
}

/// Outcome of the single join attempt allowed per (session, room).
pub(crate) type JoinAttempt = Arc<OnceCell<Result<(), String>>>;

/// One homeserver as seen by the reconciliation run.
pub struct EndpointSession {
    client: Arc<dyn HomeserverClient>,
    identity: String,
    key: String,
    joined_rooms: Mutex<HashSet<RoomId>>,
    join_attempts: Mutex<HashMap<RoomId, JoinAttempt>>,
    request_timeout: Duration,
}

impl EndpointSession {
    /// Resolve identity and joined rooms for a client.
    ///
    /// Both requests are issued concurrently; either failing fails the session.
    pub async fn connect(
        client: Arc<dyn HomeserverClient>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let (identity, joined_rooms) = tokio::try_join!(
            with_timeout(request_timeout, client.whoami()),
            with_timeout(request_timeout, client.joined_rooms()),
        )?;

        info!(
            endpoint = %client.endpoint(),
            identity = %identity,
            joined_rooms = joined_rooms.len(),
            "Homeserver session ready"
        );

        Ok(Self {
            client,
            key: identity.clone(),
            identity,
            joined_rooms: Mutex::new(joined_rooms),
            join_attempts: Mutex::new(HashMap::new()),
            request_timeout,
        })
    }

    /// Connect every client, failing the whole set if any one fails.
    ///
    /// Mirrors of one server name usually share a user ID. Such sessions get
    /// a key with the endpoint appended (and the config position, if even
    /// that repeats) so every session is reported separately.
    pub async fn connect_all(
        clients: Vec<Arc<dyn HomeserverClient>>,
        request_timeout: Duration,
    ) -> Result<Vec<Arc<Self>>, StartupError> {
        let sessions = try_join_all(clients.into_iter().map(|client| {
            let endpoint = client.endpoint().to_string();
            let span = spans::endpoint(&endpoint, None);
            async move {
                Self::connect(client, request_timeout)
                    .await
                    .map_err(|source| StartupError::EndpointInit { endpoint, source })
            }
            .instrument(span)
        }))
        .await?;

        Ok(assign_keys(sessions).into_iter().map(Arc::new).collect())
    }

    /// Unique name of this session within the run, used to key reports.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The user ID behind this session's access token.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The homeserver domain of [`identity`](Self::identity).
    pub fn home_domain(&self) -> &str {
        home_domain(&self.identity)
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn client(&self) -> &dyn HomeserverClient {
        self.client.as_ref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn is_joined(&self, room_id: &RoomId) -> bool {
        self.joined_rooms.lock().contains(room_id)
    }

    /// Record a successful join. Returns `false` if it was already recorded.
    pub(crate) fn mark_joined(&self, room_id: RoomId) -> bool {
        self.joined_rooms.lock().insert(room_id)
    }

    pub fn joined_room_count(&self) -> usize {
        self.joined_rooms.lock().len()
    }

    /// The join cell for a room, shared by every caller for that room.
    pub(crate) fn join_attempt(&self, room_id: &RoomId) -> JoinAttempt {
        self.join_attempts
            .lock()
            .entry(room_id.clone())
            .or_default()
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

fn assign_keys(mut sessions: Vec<EndpointSession>) -> Vec<EndpointSession> {
    fn count<'a>(keys: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
        let mut counts = HashMap::new();
        for key in keys {
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    let shared: HashSet<String> = count(sessions.iter().map(|s| s.identity()))
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(identity, _)| identity.to_string())
        .collect();
    if shared.is_empty() {
        return sessions;
    }

    for session in sessions.iter_mut().filter(|s| shared.contains(&s.identity)) {
        session.key = format!("{} ({})", session.identity, session.endpoint());
    }

    let repeated: HashSet<String> = count(sessions.iter().map(|s| s.key()))
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    for (index, session) in sessions.iter_mut().enumerate() {
        if repeated.contains(&session.key) {
            session.key = format!("{} #{}", session.key, index + 1);
        }
    }

    for identity in &shared {
        warn!(
            identity = %identity,
            "Several homeservers authenticate as the same user, reporting them by endpoint"
        );
    }
    sessions
}

impl std::fmt::Debug for EndpointSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSession")
            .field("endpoint", &self.endpoint())
            .field("identity", &self.identity)
            .field("key", &self.key)
            .field("joined_rooms", &self.joined_room_count())
            .finish()
    }
}
