//! In-memory round store for tests and local development.
//!
//! Mirrors the conditional-mutation semantics of the Postgres adapter: every
//! status-gated operation reports whether it applied instead of erroring, so
//! race-losers surface as `false` exactly as a conditional UPDATE would.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ParticipantId, RoomId, RoundId, Timestamp};
use crate::domain::round::{Round, RoundStatus, Vote, VoteStats};
use crate::ports::RoundStore;

#[derive(Default)]
struct Inner {
    /// Rounds per room, in start order (so the last entry is current).
    rounds: HashMap<RoomId, Vec<Round>>,

    /// Reverse index for lookups by round id.
    round_rooms: HashMap<RoundId, RoomId>,

    /// Votes keyed by round, then participant (upsert semantics).
    votes: HashMap<RoundId, BTreeMap<ParticipantId, Vote>>,
}

impl Inner {
    fn round_mut(&mut self, round_id: &RoundId) -> Option<&mut Round> {
        let room_id = *self.round_rooms.get(round_id)?;
        self.rounds
            .get_mut(&room_id)?
            .iter_mut()
            .find(|r| r.id() == round_id)
    }

    fn round(&self, round_id: &RoundId) -> Option<&Round> {
        let room_id = self.round_rooms.get(round_id)?;
        self.rounds
            .get(room_id)?
            .iter()
            .find(|r| r.id() == round_id)
    }
}

/// In-memory implementation of [`RoundStore`].
///
/// The single mutex stands in for the per-room serialization the Postgres
/// adapter gets from conditional writes.
#[derive(Default)]
pub struct InMemoryRoundStore {
    inner: Mutex<Inner>,
}

impl InMemoryRoundStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoundStore for InMemoryRoundStore {
    async fn current_round(&self, room_id: &RoomId) -> Result<Option<Round>, DomainError> {
        let inner = self.inner.lock().await;
        Ok(inner.rounds.get(room_id).and_then(|r| r.last()).cloned())
    }

    async fn latest_round_number(&self, room_id: &RoomId) -> Result<u32, DomainError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rounds
            .get(room_id)
            .and_then(|r| r.last())
            .map(|r| r.round_number())
            .unwrap_or(0))
    }

    async fn insert_round(&self, round: &Round) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;

        let existing = inner.rounds.entry(*round.room_id()).or_default();
        if existing.iter().any(|r| r.status() == RoundStatus::Voting) {
            return Err(DomainError::invalid_state(
                "room already has a round in voting",
            ));
        }

        existing.push(round.clone());
        inner.round_rooms.insert(*round.id(), *round.room_id());
        Ok(())
    }

    async fn upsert_vote(&self, vote: &Vote) -> Result<bool, DomainError> {
        let mut inner = self.inner.lock().await;

        match inner.round(vote.round_id()) {
            Some(round) if round.status() == RoundStatus::Voting => {}
            _ => return Ok(false),
        }

        inner
            .votes
            .entry(*vote.round_id())
            .or_default()
            .insert(vote.participant_id().clone(), vote.clone());
        Ok(true)
    }

    async fn votes_for_round(&self, round_id: &RoundId) -> Result<Vec<Vote>, DomainError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .votes
            .get(round_id)
            .map(|by_participant| by_participant.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn reveal_round(
        &self,
        round_id: &RoundId,
        stats: &VoteStats,
        revealed_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut inner = self.inner.lock().await;

        let Some(round) = inner.round_mut(round_id) else {
            return Ok(false);
        };
        if round.status() != RoundStatus::Voting {
            return Ok(false);
        }

        round.reveal(*stats, revealed_at)?;
        Ok(true)
    }

    async fn reset_round(&self, round_id: &RoundId) -> Result<bool, DomainError> {
        let mut inner = self.inner.lock().await;

        match inner.round_mut(round_id) {
            Some(round) if round.status() == RoundStatus::Revealed => round.reset()?,
            _ => return Ok(false),
        }

        inner.votes.remove(round_id);
        Ok(true)
    }
}
