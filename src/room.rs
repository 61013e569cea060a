//! Room identifiers and state events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Sigil that starts every canonical room ID.
pub const ROOM_ID_SIGIL: char = '!';

/// A canonical room ID.
///
/// Construction always normalizes: surrounding whitespace is trimmed and the
/// `!` sigil is prepended when missing, so `abc:example.org` and
/// `!abc:example.org` name the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        if raw.starts_with(ROOM_ID_SIGIL) {
            Self(raw.to_string())
        } else {
            Self(format!("{}{}", ROOM_ID_SIGIL, raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// A room state event.
///
/// Only `event_id` takes part in comparisons; everything else is carried
/// through untouched so reports can show it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub event_id: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl StateEvent {
    /// An event with no payload, mostly useful in tests.
    pub fn bare(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            payload: Map::new(),
        }
    }

    /// The event `type`, if present (e.g., `m.room.member`).
    pub fn event_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// The event `state_key`, if present.
    pub fn state_key(&self) -> Option<&str> {
        self.payload.get("state_key").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_prepends_sigil() {
        assert_eq!(RoomId::new("abc:example.org").as_str(), "!abc:example.org");
        assert_eq!(RoomId::new("!abc:example.org").as_str(), "!abc:example.org");
        assert_eq!(RoomId::new("  abc:example.org\n").as_str(), "!abc:example.org");
    }

    #[test]
    fn test_room_id_normalized_forms_are_equal() {
        assert_eq!(RoomId::new("abc:example.org"), RoomId::new("!abc:example.org"));
    }

    #[test]
    fn test_room_id_deserialize_normalizes() {
        let ids: Vec<RoomId> = serde_json::from_str(r#"["!a:x", "b:y"]"#).unwrap();
        assert_eq!(ids, vec![RoomId::new("!a:x"), RoomId::new("!b:y")]);
    }

    #[test]
    fn test_state_event_keeps_payload() {
        let json = r#"{
            "event_id": "$abc",
            "type": "m.room.member",
            "state_key": "@alice:a.example",
            "content": { "membership": "join" }
        }"#;
        let event: StateEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_id, "$abc");
        assert_eq!(event.event_type(), Some("m.room.member"));
        assert_eq!(event.state_key(), Some("@alice:a.example"));
        assert!(event.payload.contains_key("content"));

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["event_id"], "$abc");
        assert_eq!(back["content"]["membership"], "join");
    }
}
