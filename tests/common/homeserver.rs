#![allow(dead_code)]

//! Fake Matrix homeserver.
//!
//! Serves just enough of the client-server API for roomdiff: whoami,
//! joined_rooms, join and room state. Each instance listens on an ephemeral
//! port and shuts down when dropped.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Inner {
    user_id: String,
    token: String,
    rooms: HashMap<String, Vec<Value>>,
    joined: Mutex<HashSet<String>>,
    forbidden_joins: HashSet<String>,
    broken_state: HashSet<String>,
    slow_state: HashMap<String, Duration>,
    join_calls: AtomicUsize,
    state_calls: AtomicUsize,
}

/// Configures a [`FakeHomeserver`] before it starts.
pub struct Builder {
    inner: Inner,
}

impl Builder {
    /// A room whose state is one marker event per ID.
    pub fn room(mut self, room_id: &str, event_ids: &[&str]) -> Self {
        let events = event_ids
            .iter()
            .map(|id| {
                json!({
                    "event_id": id,
                    "type": "org.example.marker",
                    "state_key": id,
                    "sender": self.inner.user_id,
                    "content": { "marker": id },
                })
            })
            .collect();
        self.inner.rooms.insert(room_id.to_string(), events);
        self
    }

    /// A room with fully specified state events.
    pub fn room_events(mut self, room_id: &str, events: Vec<Value>) -> Self {
        self.inner.rooms.insert(room_id.to_string(), events);
        self
    }

    pub fn joined(self, room_id: &str) -> Self {
        self.inner.joined.lock().insert(room_id.to_string());
        self
    }

    /// Reject joins to `room_id` with `M_FORBIDDEN`.
    pub fn forbid_join(mut self, room_id: &str) -> Self {
        self.inner.forbidden_joins.insert(room_id.to_string());
        self
    }

    /// Answer state requests for `room_id` with a 500.
    pub fn break_state(mut self, room_id: &str) -> Self {
        self.inner.broken_state.insert(room_id.to_string());
        self
    }

    /// Delay state responses for `room_id`.
    pub fn slow_state(mut self, room_id: &str, delay: Duration) -> Self {
        self.inner.slow_state.insert(room_id.to_string(), delay);
        self
    }

    pub async fn spawn(self) -> FakeHomeserver {
        let inner = Arc::new(self.inner);
        let router = Router::new()
            .route("/_matrix/client/v3/account/whoami", get(whoami))
            .route("/_matrix/client/v3/joined_rooms", get(joined_rooms))
            .route("/_matrix/client/v3/join/:room_id", post(join))
            .route("/_matrix/client/v3/rooms/:room_id/state", get(room_state))
            .with_state(inner.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake homeserver");
        let addr = listener.local_addr().expect("fake homeserver local_addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                eprintln!("fake homeserver failed: {err}");
            }
        });

        FakeHomeserver {
            addr,
            inner,
            shutdown: Some(shutdown_tx),
        }
    }
}

/// A running fake homeserver.
pub struct FakeHomeserver {
    addr: SocketAddr,
    inner: Arc<Inner>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeHomeserver {
    pub fn builder(user_id: &str, token: &str) -> Builder {
        Builder {
            inner: Inner {
                user_id: user_id.to_string(),
                token: token.to_string(),
                rooms: HashMap::new(),
                joined: Mutex::new(HashSet::new()),
                forbidden_joins: HashSet::new(),
                broken_state: HashSet::new(),
                slow_state: HashMap::new(),
                join_calls: AtomicUsize::new(0),
                state_calls: AtomicUsize::new(0),
            },
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn join_calls(&self) -> usize {
        self.inner.join_calls.load(Ordering::SeqCst)
    }

    pub fn state_calls(&self) -> usize {
        self.inner.state_calls.load(Ordering::SeqCst)
    }

    pub fn is_joined(&self, room_id: &str) -> bool {
        self.inner.joined.lock().contains(room_id)
    }
}

impl Drop for FakeHomeserver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn matrix_error(status: StatusCode, errcode: &str, error: &str) -> Response {
    (status, Json(json!({ "errcode": errcode, "error": error }))).into_response()
}

fn check_token(inner: &Inner, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == inner.token => Ok(()),
        Some(_) => Err(matrix_error(
            StatusCode::UNAUTHORIZED,
            "M_UNKNOWN_TOKEN",
            "Invalid access token passed.",
        )),
        None => Err(matrix_error(
            StatusCode::UNAUTHORIZED,
            "M_MISSING_TOKEN",
            "Missing access token.",
        )),
    }
}

async fn whoami(State(inner): State<Arc<Inner>>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_token(&inner, &headers) {
        return resp;
    }
    Json(json!({ "user_id": inner.user_id })).into_response()
}

async fn joined_rooms(State(inner): State<Arc<Inner>>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_token(&inner, &headers) {
        return resp;
    }
    let rooms: Vec<String> = inner.joined.lock().iter().cloned().collect();
    Json(json!({ "joined_rooms": rooms })).into_response()
}

async fn join(
    State(inner): State<Arc<Inner>>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_token(&inner, &headers) {
        return resp;
    }
    inner.join_calls.fetch_add(1, Ordering::SeqCst);

    if inner.forbidden_joins.contains(&room_id) {
        return matrix_error(
            StatusCode::FORBIDDEN,
            "M_FORBIDDEN",
            "You are not invited to this room.",
        );
    }
    if !inner.rooms.contains_key(&room_id) {
        return matrix_error(StatusCode::NOT_FOUND, "M_NOT_FOUND", "No known servers");
    }

    inner.joined.lock().insert(room_id.clone());
    Json(json!({ "room_id": room_id })).into_response()
}

async fn room_state(
    State(inner): State<Arc<Inner>>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_token(&inner, &headers) {
        return resp;
    }
    inner.state_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = inner.slow_state.get(&room_id) {
        tokio::time::sleep(*delay).await;
    }

    if !inner.joined.lock().contains(&room_id) {
        return matrix_error(
            StatusCode::FORBIDDEN,
            "M_FORBIDDEN",
            "User not in room.",
        );
    }
    if inner.broken_state.contains(&room_id) {
        return matrix_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "M_UNKNOWN",
            "Internal server error",
        );
    }

    let events = inner.rooms.get(&room_id).cloned().unwrap_or_default();
    Json(Value::Array(events)).into_response()
}
