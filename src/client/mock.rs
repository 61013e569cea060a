//! Scripted in-memory homeserver for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::HomeserverClient;
use crate::error::ClientError;
use crate::room::{RoomId, StateEvent};

pub(crate) struct MockClient {
    endpoint: String,
    user_id: String,
    joined: Mutex<HashSet<RoomId>>,
    states: HashMap<RoomId, Vec<StateEvent>>,
    unjoinable: HashSet<RoomId>,
    unreadable: HashSet<RoomId>,
    whoami_fails: bool,
    delay: Option<Duration>,
    join_calls: AtomicUsize,
    state_calls: AtomicUsize,
}

impl MockClient {
    pub(crate) fn new(user_id: &str) -> Self {
        let domain = user_id.split_once(':').map_or("mock", |(_, d)| d);
        Self {
            endpoint: format!("https://{}/", domain),
            user_id: user_id.to_string(),
            joined: Mutex::new(HashSet::new()),
            states: HashMap::new(),
            unjoinable: HashSet::new(),
            unreadable: HashSet::new(),
            whoami_fails: false,
            delay: None,
            join_calls: AtomicUsize::new(0),
            state_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Room state served by this homeserver; the user is not joined yet.
    pub(crate) fn with_room(mut self, room: &str, event_ids: &[&str]) -> Self {
        let events = event_ids.iter().map(|id| StateEvent::bare(*id)).collect();
        self.states.insert(RoomId::new(room), events);
        self
    }

    pub(crate) fn with_room_events(mut self, room: &str, events: Vec<StateEvent>) -> Self {
        self.states.insert(RoomId::new(room), events);
        self
    }

    pub(crate) fn already_joined(self, room: &str) -> Self {
        self.joined.lock().insert(RoomId::new(room));
        self
    }

    pub(crate) fn failing_join(mut self, room: &str) -> Self {
        self.unjoinable.insert(RoomId::new(room));
        self
    }

    pub(crate) fn failing_state(mut self, room: &str) -> Self {
        self.unreadable.insert(RoomId::new(room));
        self
    }

    pub(crate) fn failing_whoami(mut self) -> Self {
        self.whoami_fails = true;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl HomeserverClient for MockClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn whoami(&self) -> Result<String, ClientError> {
        self.pause().await;
        if self.whoami_fails {
            return Err(ClientError::Unauthorized("M_UNKNOWN_TOKEN".into()));
        }
        Ok(self.user_id.clone())
    }

    async fn joined_rooms(&self) -> Result<HashSet<RoomId>, ClientError> {
        self.pause().await;
        Ok(self.joined.lock().clone())
    }

    async fn join_room(&self, room_id: &RoomId) -> Result<(), ClientError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.unjoinable.contains(room_id) || !self.states.contains_key(room_id) {
            return Err(ClientError::Forbidden(format!("cannot join {}", room_id)));
        }
        self.joined.lock().insert(room_id.clone());
        Ok(())
    }

    async fn room_state(&self, room_id: &RoomId) -> Result<Vec<StateEvent>, ClientError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.unreadable.contains(room_id) || !self.joined.lock().contains(room_id) {
            return Err(ClientError::Forbidden(format!("not in room {}", room_id)));
        }
        self.states
            .get(room_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(room_id.to_string()))
    }
}
