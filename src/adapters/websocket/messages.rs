//! Wire message types for the room protocol.
//!
//! Both directions share one envelope shape: `{type, requestId, payload}`.
//! Replies echo the inbound requestId; server-initiated events carry a fresh
//! one. Payload field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EventEnvelope, RoundId};

// ============================================
// Client → Server
// ============================================

/// Inbound message envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    /// Message type, e.g. "vote.cast.v1".
    #[serde(rename = "type")]
    pub message_type: String,

    /// Client-chosen id echoed back on direct replies.
    #[serde(rename = "requestId")]
    pub request_id: Uuid,

    /// Type-specific payload; defaults to null for payload-free types.
    #[serde(default)]
    pub payload: JsonValue,
}

/// Payload of `vote.cast.v1`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVotePayload {
    pub round_id: RoundId,
    pub card_value: String,
}

/// Payload of `round.start.v1`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoundPayload {
    pub story_title: String,
}

/// Payload of `round.reveal.v1` and `round.reset.v1`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundTargetPayload {
    pub round_id: RoundId,
}

/// Payload of `chat.message.v1`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatPayload {
    pub text: String,
}

// ============================================
// Server → Client
// ============================================

/// Outbound message envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope {
    /// Message type, e.g. "round.revealed.v1".
    #[serde(rename = "type")]
    pub message_type: String,

    /// Echo of the inbound requestId, or fresh for server-initiated events.
    #[serde(rename = "requestId")]
    pub request_id: Uuid,

    /// Type-specific payload.
    pub payload: JsonValue,
}

/// Payload of `error.v1`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Numeric code in the 4000-4999 subsystem namespace.
    pub code: u16,

    /// Stable symbolic name for the code.
    pub reason: &'static str,

    /// Human-readable description; never leaks internals.
    pub message: String,
}

impl ServerEnvelope {
    /// Wraps a bus envelope for delivery to a client. Server-initiated, so
    /// the requestId is fresh.
    pub fn event(envelope: &EventEnvelope) -> Self {
        Self {
            message_type: envelope.event_type.clone(),
            request_id: Uuid::new_v4(),
            payload: envelope.payload.clone(),
        }
    }

    /// Direct reply to a client request.
    pub fn reply(request_id: Uuid, message_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            message_type: message_type.into(),
            request_id,
            payload,
        }
    }

    /// `error.v1` reply for a failed request.
    pub fn error(request_id: Uuid, err: &DomainError) -> Self {
        Self::reply(
            request_id,
            "error.v1",
            serde_json::json!(ErrorPayload {
                code: err.code.wire_code(),
                reason: err.code.as_str(),
                message: err.message.clone(),
            }),
        )
    }

    /// Server-initiated liveness probe.
    pub fn ping() -> Self {
        Self {
            message_type: "ping".to_string(),
            request_id: Uuid::new_v4(),
            payload: JsonValue::Null,
        }
    }

    /// Serializes for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerEnvelope serialization should not fail")
    }
}
