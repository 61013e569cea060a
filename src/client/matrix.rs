//! Matrix client-server API client.
//!
//! Implements the four calls the reconciliation pipeline needs:
//!
//! | Call           | Request                                        |
//! |----------------|------------------------------------------------|
//! | `whoami`       | `GET  /_matrix/client/v3/account/whoami`       |
//! | `joined_rooms` | `GET  /_matrix/client/v3/joined_rooms`         |
//! | `join_room`    | `POST /_matrix/client/v3/join/{roomId}`        |
//! | `room_state`   | `GET  /_matrix/client/v3/rooms/{roomId}/state` |
//!
//! Error responses carry a `{ "errcode", "error" }` body which is folded into
//! [`ClientError`].

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use tracing::debug;

use super::HomeserverClient;
use crate::config::{HomeserverConfig, TimeoutsConfig};
use crate::error::ClientError;
use crate::room::{RoomId, StateEvent};

const CLIENT_API_PREFIX: [&str; 3] = ["_matrix", "client", "v3"];

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct JoinedRoomsResponse {
    joined_rooms: Vec<RoomId>,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    room_id: RoomId,
}

#[derive(Debug, Default, Deserialize)]
struct MatrixErrorBody {
    #[serde(default)]
    errcode: String,
    #[serde(default)]
    error: String,
}

impl MatrixErrorBody {
    fn describe(&self, status: StatusCode) -> String {
        match (self.errcode.is_empty(), self.error.is_empty()) {
            (true, true) => format!("HTTP {}", status.as_u16()),
            (false, true) => self.errcode.clone(),
            (true, false) => self.error.clone(),
            (false, false) => format!("{}: {}", self.errcode, self.error),
        }
    }
}

/// HTTP client for one homeserver.
pub struct MatrixClient {
    base: Url,
    access_token: String,
    http: reqwest::Client,
}

impl MatrixClient {
    /// Create a client for a configured homeserver.
    pub fn new(config: &HomeserverConfig, timeouts: &TimeoutsConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.url.clone()));
        }

        // Per-call deadlines come from `with_timeout` in the session layer.
        let http = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .user_agent(concat!("roomdiff/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base,
            access_token: config.access_token.clone(),
            http,
        })
    }

    /// Build an API URL, percent-encoding every segment.
    fn api_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(CLIENT_API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    /// Send an authenticated request and decode a JSON response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        debug!(endpoint = %self.base, url = %response.url(), status = status.as_u16(), "Homeserver response");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let body: MatrixErrorBody = response.json().await.unwrap_or_default();
        let description = body.describe(status);
        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(description),
            StatusCode::FORBIDDEN => ClientError::Forbidden(description),
            StatusCode::NOT_FOUND => ClientError::NotFound(description),
            _ => ClientError::Http {
                status: status.as_u16(),
                errcode: body.errcode,
                message: body.error,
            },
        })
    }
}

#[async_trait]
impl HomeserverClient for MatrixClient {
    fn endpoint(&self) -> &str {
        self.base.as_str()
    }

    async fn whoami(&self) -> Result<String, ClientError> {
        let url = self.api_url(&["account", "whoami"])?;
        let response: WhoamiResponse = self.send(self.http.get(url)).await?;
        Ok(response.user_id)
    }

    async fn joined_rooms(&self) -> Result<HashSet<RoomId>, ClientError> {
        let url = self.api_url(&["joined_rooms"])?;
        let response: JoinedRoomsResponse = self.send(self.http.get(url)).await?;
        Ok(response.joined_rooms.into_iter().collect())
    }

    async fn join_room(&self, room_id: &RoomId) -> Result<(), ClientError> {
        let url = self.api_url(&["join", room_id.as_str()])?;
        let request = self.http.post(url).json(&serde_json::json!({}));
        let response: JoinResponse = self.send(request).await?;
        debug!(endpoint = %self.base, room = %response.room_id, "Joined room");
        Ok(())
    }

    async fn room_state(&self, room_id: &RoomId) -> Result<Vec<StateEvent>, ClientError> {
        let url = self.api_url(&["rooms", room_id.as_str(), "state"])?;
        self.send(self.http.get(url)).await
    }
}
