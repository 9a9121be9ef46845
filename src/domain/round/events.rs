//! Room event payloads published by the voting engine.
//!
//! Events are notification hints; the durable Round/Vote store stays the
//! source of truth. Consumers must tolerate duplicates and out-of-order
//! delivery across processes.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ParticipantId, ParticipantRole, RoomEvent, RoundId};

use super::consensus::VoteStats;
use super::vote::CardValue;

/// Published when a host starts a new round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarted {
    pub round_id: RoundId,
    pub round_number: u32,
    pub story_title: String,
}

impl RoomEvent for RoundStarted {
    fn event_type(&self) -> &'static str {
        "round.started.v1"
    }
}

/// Published when a participant casts or replaces a vote.
///
/// The card value is deliberately withheld until reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecorded {
    pub participant_id: ParticipantId,
}

impl RoomEvent for VoteRecorded {
    fn event_type(&self) -> &'static str {
        "vote.recorded.v1"
    }
}

/// A single disclosed vote inside a reveal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedVote {
    pub participant_id: ParticipantId,
    pub card_value: CardValue,
}

/// Published when a host reveals a round; discloses every card value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRevealed {
    pub round_id: RoundId,
    pub votes: Vec<RevealedVote>,
    pub stats: VoteStats,
}

impl RoomEvent for RoundRevealed {
    fn event_type(&self) -> &'static str {
        "round.revealed.v1"
    }
}

/// Published when a host resets a revealed round for a re-vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReset {
    pub round_id: RoundId,
}

impl RoomEvent for RoundReset {
    fn event_type(&self) -> &'static str {
        "round.reset.v1"
    }
}

/// Published when a connection is admitted to a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantJoined {
    pub participant_id: ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: ParticipantRole,
}

impl RoomEvent for ParticipantJoined {
    fn event_type(&self) -> &'static str {
        "participant_joined.v1"
    }
}

/// Published when a connection leaves a room for any reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLeft {
    pub participant_id: ParticipantId,
}

impl RoomEvent for ParticipantLeft {
    fn event_type(&self) -> &'static str {
        "participant_left.v1"
    }
}

/// Room-wide chat line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub participant_id: ParticipantId,
    pub text: String,
}

impl RoomEvent for ChatMessage {
    fn event_type(&self) -> &'static str {
        "chat.message.v1"
    }
}
