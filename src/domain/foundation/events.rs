//! Event infrastructure for room-scoped event publishing.
//!
//! Every cross-process notification travels as an [`EventEnvelope`]: the
//! event type for routing, the room it belongs to, a JSON payload, and an
//! event id consumers can use for deduplication (delivery is at-least-once).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::{RoomId, Timestamp};

/// Unique identifier for events (used for deduplication).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport envelope for room events.
///
/// The envelope is what crosses the shared channel; the payload is opaque
/// JSON so a process can fan an envelope out to its local connections
/// without understanding every event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique ID for this event instance.
    pub event_id: EventId,

    /// Event type for routing (e.g., "round.started.v1").
    pub event_type: String,

    /// Room this event belongs to.
    pub room_id: RoomId,

    /// Event-specific payload as JSON.
    pub payload: JsonValue,

    /// When the event was emitted by the publishing process.
    pub emitted_at: Timestamp,
}

impl EventEnvelope {
    /// Creates a new envelope stamped with a fresh event id and emission time.
    pub fn new(event_type: impl Into<String>, room_id: RoomId, payload: JsonValue) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            room_id,
            payload,
            emitted_at: Timestamp::now(),
        }
    }

    /// Deserialize payload to a specific event type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Trait for typed room event payloads.
///
/// Implementors name their wire type; `to_envelope` is provided for any
/// serializable event so publishers never hand-build envelopes.
pub trait RoomEvent: Serialize {
    /// Returns the event type string (e.g., "round.started.v1").
    fn event_type(&self) -> &'static str;

    /// Wraps this event in a transport envelope for the given room.
    fn to_envelope(&self, room_id: RoomId) -> EventEnvelope {
        EventEnvelope::new(
            self.event_type(),
            room_id,
            serde_json::to_value(self)
                .expect("event serialization should never fail for well-formed events"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_generates_unique_values() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn envelope_new_stamps_id_and_time() {
        let room = RoomId::new();
        let envelope = EventEnvelope::new("round.started.v1", room, json!({"roundNumber": 1}));

        assert_eq!(envelope.event_type, "round.started.v1");
        assert_eq!(envelope.room_id, room);
        assert_eq!(envelope.payload["roundNumber"], 1);
    }

    #[test]
    fn envelope_serialization_round_trip() {
        let envelope = EventEnvelope::new("chat.message.v1", RoomId::new(), json!({"text": "hi"}));

        let wire = serde_json::to_string(&envelope).unwrap();
        let restored: EventEnvelope = serde_json::from_str(&wire).unwrap();

        assert_eq!(restored.event_id, envelope.event_id);
        assert_eq!(restored.event_type, envelope.event_type);
        assert_eq!(restored.room_id, envelope.room_id);
        assert_eq!(restored.payload, envelope.payload);
    }

    #[test]
    fn payload_as_deserializes_typed_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Chat {
            text: String,
        }

        let envelope = EventEnvelope::new("chat.message.v1", RoomId::new(), json!({"text": "hi"}));
        let chat: Chat = envelope.payload_as().unwrap();
        assert_eq!(chat.text, "hi");
    }

    #[test]
    fn room_event_to_envelope_carries_type_and_payload() {
        #[derive(Serialize)]
        struct Ping {
            n: u32,
        }

        impl RoomEvent for Ping {
            fn event_type(&self) -> &'static str {
                "test.ping.v1"
            }
        }

        let room = RoomId::new();
        let envelope = Ping { n: 7 }.to_envelope(room);

        assert_eq!(envelope.event_type, "test.ping.v1");
        assert_eq!(envelope.room_id, room);
        assert_eq!(envelope.payload["n"], 7);
    }
}
