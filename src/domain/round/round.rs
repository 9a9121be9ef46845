//! Round aggregate entity.
//!
//! A round is one estimation cycle for a single story, bounded by start and
//! reveal/reset. A room has at most one current round; its number strictly
//! increases with each new start.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, RoomId, RoundId, StateMachine, Timestamp, ValidationError,
};

use super::consensus::VoteStats;

/// Maximum length for a story title.
pub const MAX_STORY_TITLE_LENGTH: usize = 200;

/// Lifecycle status of a round.
///
/// The transition table is the whole state machine: Voting flips to Revealed
/// on an explicit reveal, Revealed flips back to Voting on an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    /// Votes are being collected; card values stay hidden.
    Voting,
    /// Votes and statistics are visible to the whole room.
    Revealed,
}

impl RoundStatus {
    /// Stable lowercase name, matching the persisted form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Voting => "voting",
            RoundStatus::Revealed => "revealed",
        }
    }
}

impl std::str::FromStr for RoundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voting" => Ok(RoundStatus::Voting),
            "revealed" => Ok(RoundStatus::Revealed),
            other => Err(format!("unknown round status: {}", other)),
        }
    }
}

impl StateMachine for RoundStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (RoundStatus::Voting, RoundStatus::Revealed)
                | (RoundStatus::Revealed, RoundStatus::Voting)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            RoundStatus::Voting => vec![RoundStatus::Revealed],
            RoundStatus::Revealed => vec![RoundStatus::Voting],
        }
    }
}

/// Round aggregate - one estimation cycle for a story.
///
/// # Invariants
///
/// - `round_number` is unique within the room and strictly increasing
/// - `stats` and `revealed_at` are Some iff status is Revealed
/// - a reset clears stats/revealed_at but keeps number and title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    id: RoundId,
    room_id: RoomId,
    round_number: u32,
    story_title: String,
    status: RoundStatus,
    started_at: Timestamp,
    revealed_at: Option<Timestamp>,
    stats: Option<VoteStats>,
}

impl Round {
    /// Start a new round in Voting status.
    ///
    /// # Errors
    ///
    /// - `InvalidPayload` if the story title is empty or too long
    pub fn start(
        room_id: RoomId,
        story_title: String,
        round_number: u32,
    ) -> Result<Self, DomainError> {
        let story_title = Self::validate_title(story_title)?;

        Ok(Self {
            id: RoundId::new(),
            room_id,
            round_number,
            story_title,
            status: RoundStatus::Voting,
            started_at: Timestamp::now(),
            revealed_at: None,
            stats: None,
        })
    }

    /// Reconstitute a round from persistence (no validation, no events).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: RoundId,
        room_id: RoomId,
        round_number: u32,
        story_title: String,
        status: RoundStatus,
        started_at: Timestamp,
        revealed_at: Option<Timestamp>,
        stats: Option<VoteStats>,
    ) -> Self {
        Self {
            id,
            room_id,
            round_number,
            story_title,
            status,
            started_at,
            revealed_at,
            stats,
        }
    }

    /// Returns the round ID.
    pub fn id(&self) -> &RoundId {
        &self.id
    }

    /// Returns the owning room's ID.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Returns the round number within the room.
    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    /// Returns the story title.
    pub fn story_title(&self) -> &str {
        &self.story_title
    }

    /// Returns the current status.
    pub fn status(&self) -> RoundStatus {
        self.status
    }

    /// Returns when the round was started.
    pub fn started_at(&self) -> &Timestamp {
        &self.started_at
    }

    /// Returns when the round was revealed, if it has been.
    pub fn revealed_at(&self) -> Option<&Timestamp> {
        self.revealed_at.as_ref()
    }

    /// Returns the computed statistics, present only after reveal.
    pub fn stats(&self) -> Option<&VoteStats> {
        self.stats.as_ref()
    }

    /// Returns true if votes may currently be cast against this round.
    pub fn is_voting(&self) -> bool {
        self.status == RoundStatus::Voting
    }

    /// Flip to Revealed, recording statistics and the reveal time.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the round is not in Voting status
    pub fn reveal(&mut self, stats: VoteStats, revealed_at: Timestamp) -> Result<(), DomainError> {
        self.status = self.status.transition_to(RoundStatus::Revealed)?;
        self.stats = Some(stats);
        self.revealed_at = Some(revealed_at);
        Ok(())
    }

    /// Flip back to Voting, clearing statistics and the reveal time.
    ///
    /// Round number and story title survive; the round is re-votable.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the round is not in Revealed status
    pub fn reset(&mut self) -> Result<(), DomainError> {
        self.status = self.status.transition_to(RoundStatus::Voting)?;
        self.stats = None;
        self.revealed_at = None;
        Ok(())
    }

    fn validate_title(title: String) -> Result<String, ValidationError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::empty_field("story_title"));
        }
        if title.len() > MAX_STORY_TITLE_LENGTH {
            return Err(ValidationError::too_long("story_title", MAX_STORY_TITLE_LENGTH));
        }
        Ok(title)
    }
}
