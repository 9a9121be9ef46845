//! RoundStore port - durable storage of Round and Vote records.
//!
//! The store is shared across server processes and is the source of truth
//! for round state. Per-room serialization lives here: every mutation is
//! conditioned on the status it expects, so the loser of a race affects
//! zero rows and reports it instead of corrupting state.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RoomId, RoundId, Timestamp};
use crate::domain::round::{Round, Vote, VoteStats};

/// Port for durable Round/Vote storage.
///
/// Implementations must guarantee:
/// - at most one Voting round per room (insert fails otherwise)
/// - conditional mutations report whether they applied (`false` = lost race
///   or wrong status, never an exception)
/// - `reveal_round` writes stats, revealed_at, and status as one durable
///   unit; a crash mid-reveal cannot leave a partial reveal
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Returns the room's latest round (highest number), any status.
    async fn current_round(&self, room_id: &RoomId) -> Result<Option<Round>, DomainError>;

    /// Returns the highest round number used in the room, 0 if none.
    async fn latest_round_number(&self, room_id: &RoomId) -> Result<u32, DomainError>;

    /// Persists a freshly started round.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the room already has a Voting round
    async fn insert_round(&self, round: &Round) -> Result<(), DomainError>;

    /// Upserts a vote keyed by (round, participant).
    ///
    /// Returns `false` when the target round is not in Voting status
    /// (a cast that lost a race against a reveal).
    async fn upsert_vote(&self, vote: &Vote) -> Result<bool, DomainError>;

    /// Loads all votes for a round.
    async fn votes_for_round(&self, round_id: &RoundId) -> Result<Vec<Vote>, DomainError>;

    /// Flips a Voting round to Revealed, writing stats and reveal time
    /// atomically with the status change.
    ///
    /// Returns `false` when the round was not in Voting status.
    async fn reveal_round(
        &self,
        round_id: &RoundId,
        stats: &VoteStats,
        revealed_at: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Flips a Revealed round back to Voting, deleting its votes and
    /// clearing stats and reveal time.
    ///
    /// Returns `false` when the round was not in Revealed status.
    async fn reset_round(&self, round_id: &RoundId) -> Result<bool, DomainError>;
}
