//! Voting service - the authoritative round/vote state machine.
//!
//! All round mutations flow through here: the service loads the room's
//! current round, enforces the lifecycle rules, writes through the durable
//! store, and only then publishes the matching room event. The store is the
//! source of truth; events are notification hints.
//!
//! Concurrency: operations on the same room serialize through the store's
//! status-conditioned writes. When two mutations race, the loser's write
//! affects nothing and surfaces here as `InvalidState` rather than
//! corrupting round state.

use std::sync::Arc;

use crate::domain::foundation::{
    DomainError, ErrorCode, ParticipantId, RoomEvent, RoomId, RoundId, Timestamp,
};
use crate::domain::round::{
    consensus, CardValue, RevealedVote, Round, RoundReset, RoundRevealed, RoundStarted,
    RoundStatus, Vote, VoteRecorded, VoteStats,
};
use crate::ports::{RoomBus, RoundStore};

/// Current room state, replayed to clients that join or resync.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// The room's current round.
    pub round: Round,

    /// Disclosed votes; populated only when the round is revealed.
    pub votes: Vec<Vote>,
}

/// Authoritative service for the round lifecycle.
pub struct VotingService {
    store: Arc<dyn RoundStore>,
    bus: Arc<dyn RoomBus>,
}

impl VotingService {
    /// Creates a voting service over the given store and bus.
    pub fn new(store: Arc<dyn RoundStore>, bus: Arc<dyn RoomBus>) -> Self {
        Self { store, bus }
    }

    /// Starts a new round for the room.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if a round is already in Voting status
    /// - `InvalidPayload` if the story title fails validation
    pub async fn start_round(
        &self,
        room_id: RoomId,
        story_title: String,
    ) -> Result<Round, DomainError> {
        if let Some(current) = self.store.current_round(&room_id).await? {
            if current.is_voting() {
                return Err(DomainError::invalid_state(
                    "a round is already in voting; reveal or reset it first",
                ));
            }
        }

        let number = self.store.latest_round_number(&room_id).await? + 1;
        let round = Round::start(room_id, story_title, number)?;

        // The store's one-voting-round-per-room constraint settles races
        // between concurrent starts; the loser gets InvalidState from here.
        self.store.insert_round(&round).await?;

        tracing::info!(
            room_id = %room_id,
            round_id = %round.id(),
            round_number = round.round_number(),
            "round started"
        );

        self.bus
            .publish(
                RoundStarted {
                    round_id: *round.id(),
                    round_number: round.round_number(),
                    story_title: round.story_title().to_string(),
                }
                .to_envelope(room_id),
            )
            .await?;

        Ok(round)
    }

    /// Records (or replaces) a participant's vote in the current round.
    ///
    /// The cast value is withheld from the published event; other
    /// participants only learn who has voted until reveal.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the identified round is the current Voting round
    pub async fn cast_vote(
        &self,
        room_id: RoomId,
        round_id: RoundId,
        participant_id: ParticipantId,
        card_value: CardValue,
    ) -> Result<(), DomainError> {
        self.require_current(&room_id, &round_id, RoundStatus::Voting)
            .await?;

        let vote = Vote::new(round_id, participant_id.clone(), card_value);
        if !self.store.upsert_vote(&vote).await? {
            return Err(DomainError::invalid_state(
                "round is no longer accepting votes",
            ));
        }

        tracing::debug!(
            room_id = %room_id,
            round_id = %round_id,
            participant_id = %participant_id,
            "vote recorded"
        );

        self.bus
            .publish(VoteRecorded { participant_id }.to_envelope(room_id))
            .await?;

        Ok(())
    }

    /// Reveals the current round: computes statistics, persists them with
    /// the status flip as one durable unit, and discloses every vote.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the identified round is the current Voting round
    /// - `InvalidVote` if the round has zero votes
    pub async fn reveal_round(
        &self,
        room_id: RoomId,
        round_id: RoundId,
    ) -> Result<(Vec<Vote>, VoteStats), DomainError> {
        self.require_current(&room_id, &round_id, RoundStatus::Voting)
            .await?;

        let votes = self.store.votes_for_round(&round_id).await?;
        if votes.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InvalidVote,
                "cannot reveal a round with no votes",
            ));
        }

        let stats = consensus::calculate(votes.iter().map(Vote::card_value));

        if !self
            .store
            .reveal_round(&round_id, &stats, Timestamp::now())
            .await?
        {
            // Another reveal (or a reset) won the race
            return Err(DomainError::invalid_state("round is no longer revealable"));
        }

        tracing::info!(
            room_id = %room_id,
            round_id = %round_id,
            votes = votes.len(),
            consensus = stats.consensus,
            "round revealed"
        );

        self.bus
            .publish(
                RoundRevealed {
                    round_id,
                    votes: votes
                        .iter()
                        .map(|v| RevealedVote {
                            participant_id: v.participant_id().clone(),
                            card_value: v.card_value().clone(),
                        })
                        .collect(),
                    stats,
                }
                .to_envelope(room_id),
            )
            .await?;

        Ok((votes, stats))
    }

    /// Resets a revealed round for a re-vote: deletes its votes, clears
    /// stats and reveal time, and returns it to Voting under the same
    /// number and title.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the identified round is the current Revealed round
    pub async fn reset_round(&self, room_id: RoomId, round_id: RoundId) -> Result<(), DomainError> {
        self.require_current(&room_id, &round_id, RoundStatus::Revealed)
            .await?;

        if !self.store.reset_round(&round_id).await? {
            return Err(DomainError::invalid_state("round is no longer resettable"));
        }

        tracing::info!(room_id = %room_id, round_id = %round_id, "round reset");

        self.bus
            .publish(RoundReset { round_id }.to_envelope(room_id))
            .await?;

        Ok(())
    }

    /// Loads the room's current state for replay to a (re)joining client.
    ///
    /// Votes are included only for revealed rounds; hidden votes stay
    /// hidden through a resync.
    pub async fn room_snapshot(&self, room_id: RoomId) -> Result<Option<RoomSnapshot>, DomainError> {
        let Some(round) = self.store.current_round(&room_id).await? else {
            return Ok(None);
        };

        let votes = match round.status() {
            RoundStatus::Revealed => self.store.votes_for_round(round.id()).await?,
            RoundStatus::Voting => Vec::new(),
        };

        Ok(Some(RoomSnapshot { round, votes }))
    }

    async fn require_current(
        &self,
        room_id: &RoomId,
        round_id: &RoundId,
        expected: RoundStatus,
    ) -> Result<Round, DomainError> {
        let Some(current) = self.store.current_round(room_id).await? else {
            return Err(DomainError::invalid_state("room has no round"));
        };
        if current.id() != round_id {
            return Err(DomainError::invalid_state(
                "round is not the room's current round",
            ));
        }
        if current.status() != expected {
            return Err(DomainError::invalid_state(format!(
                "round is {}, expected {}",
                current.status().as_str(),
                expected.as_str()
            )));
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::{InMemoryBroker, InMemoryRoomBus};
    use crate::adapters::storage::InMemoryRoundStore;
    use crate::adapters::websocket::RoomRegistry;

    struct Fixture {
        broker: Arc<InMemoryBroker>,
        service: VotingService,
    }

    fn fixture() -> Fixture {
        let broker = Arc::new(InMemoryBroker::new());
        let registry = Arc::new(RoomRegistry::with_default_capacity());
        let bus = InMemoryRoomBus::attach(Arc::clone(&broker), registry);
        let store = Arc::new(InMemoryRoundStore::new());
        Fixture {
            broker,
            service: VotingService::new(store, bus),
        }
    }

    fn participant(id: &str) -> ParticipantId {
        ParticipantId::new(id).unwrap()
    }

    fn card(v: &str) -> CardValue {
        CardValue::new(v).unwrap()
    }

    #[tokio::test]
    async fn start_round_persists_and_publishes() {
        let f = fixture();
        let room = RoomId::new();

        let round = f
            .service
            .start_round(room, "Checkout rework".to_string())
            .await
            .unwrap();

        assert_eq!(round.round_number(), 1);
        assert!(round.is_voting());

        let events = f.broker.events_of_type("round.started.v1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["storyTitle"], "Checkout rework");
        assert_eq!(events[0].payload["roundNumber"], 1);
    }

    #[tokio::test]
    async fn start_while_voting_fails_and_keeps_round_number() {
        let f = fixture();
        let room = RoomId::new();

        f.service
            .start_round(room, "First".to_string())
            .await
            .unwrap();
        let err = f
            .service
            .start_round(room, "Second".to_string())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidState);

        let snapshot = f.service.room_snapshot(room).await.unwrap().unwrap();
        assert_eq!(snapshot.round.round_number(), 1);
        assert_eq!(snapshot.round.story_title(), "First");
    }

    #[tokio::test]
    async fn round_numbers_increase_across_reveals() {
        let f = fixture();
        let room = RoomId::new();

        let first = f
            .service
            .start_round(room, "First".to_string())
            .await
            .unwrap();
        f.service
            .cast_vote(room, *first.id(), participant("p-1"), card("5"))
            .await
            .unwrap();
        f.service.reveal_round(room, *first.id()).await.unwrap();

        let second = f
            .service
            .start_round(room, "Second".to_string())
            .await
            .unwrap();
        assert_eq!(second.round_number(), 2);
    }

    #[tokio::test]
    async fn repeated_casts_keep_only_the_latest_value() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();
        let voter = participant("p-1");

        for value in ["1", "3", "8"] {
            f.service
                .cast_vote(room, *round.id(), voter.clone(), card(value))
                .await
                .unwrap();
        }

        let (votes, _stats) = f.service.reveal_round(room, *round.id()).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].card_value().as_str(), "8");
    }

    #[tokio::test]
    async fn cast_publishes_without_disclosing_the_value() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("13"))
            .await
            .unwrap();

        let events = f.broker.events_of_type("vote.recorded.v1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["participantId"], "p-1");
        assert!(events[0].payload.get("cardValue").is_none());
    }

    #[tokio::test]
    async fn cast_against_revealed_round_is_invalid_state() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("5"))
            .await
            .unwrap();
        f.service.reveal_round(room, *round.id()).await.unwrap();

        let err = f
            .service
            .cast_vote(room, *round.id(), participant("p-2"), card("8"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        // The revealed vote set is untouched
        let snapshot = f.service.room_snapshot(room).await.unwrap().unwrap();
        assert_eq!(snapshot.votes.len(), 1);
    }

    #[tokio::test]
    async fn cast_against_stale_round_id_is_invalid_state() {
        let f = fixture();
        let room = RoomId::new();
        f.service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        let err = f
            .service
            .cast_vote(room, RoundId::new(), participant("p-1"), card("5"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn reveal_with_zero_votes_is_rejected() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        let err = f.service.reveal_round(room, *round.id()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidVote);

        // Round stays votable
        let snapshot = f.service.room_snapshot(room).await.unwrap().unwrap();
        assert!(snapshot.round.is_voting());
    }

    #[tokio::test]
    async fn reveal_computes_stats_and_discloses_votes() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("5"))
            .await
            .unwrap();
        f.service
            .cast_vote(room, *round.id(), participant("p-2"), card("5"))
            .await
            .unwrap();
        f.service
            .cast_vote(room, *round.id(), participant("p-3"), card("5"))
            .await
            .unwrap();

        let (votes, stats) = f.service.reveal_round(room, *round.id()).await.unwrap();

        assert_eq!(votes.len(), 3);
        assert!(stats.consensus);
        assert_eq!(stats.average, Some(5.0));
        assert_eq!(stats.median, Some(5.0));

        let events = f.broker.events_of_type("round.revealed.v1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["votes"].as_array().unwrap().len(), 3);
        assert_eq!(events[0].payload["stats"]["consensus"], true);
    }

    #[tokio::test]
    async fn wide_spread_reveals_without_consensus() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        for (p, v) in [("p-1", "1"), ("p-2", "5"), ("p-3", "13")] {
            f.service
                .cast_vote(room, *round.id(), participant(p), card(v))
                .await
                .unwrap();
        }

        let (_votes, stats) = f.service.reveal_round(room, *round.id()).await.unwrap();
        assert!(!stats.consensus);
    }

    #[tokio::test]
    async fn second_reveal_is_invalid_state() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("5"))
            .await
            .unwrap();
        f.service.reveal_round(room, *round.id()).await.unwrap();

        let err = f.service.reveal_round(room, *round.id()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn reset_returns_round_to_voting_and_clears_votes() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("5"))
            .await
            .unwrap();
        f.service.reveal_round(room, *round.id()).await.unwrap();
        f.service.reset_round(room, *round.id()).await.unwrap();

        let snapshot = f.service.room_snapshot(room).await.unwrap().unwrap();
        assert!(snapshot.round.is_voting());
        assert_eq!(snapshot.round.round_number(), 1);
        assert_eq!(snapshot.round.story_title(), "Story");
        assert!(snapshot.round.stats().is_none());
        assert!(snapshot.votes.is_empty());

        assert!(f.broker.has_event("round.reset.v1"));

        // Re-votable under the same round id
        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_of_voting_round_is_invalid_state() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        let err = f.service.reset_round(room, *round.id()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn snapshot_hides_votes_while_voting() {
        let f = fixture();
        let room = RoomId::new();
        let round = f
            .service
            .start_round(room, "Story".to_string())
            .await
            .unwrap();

        f.service
            .cast_vote(room, *round.id(), participant("p-1"), card("5"))
            .await
            .unwrap();

        let snapshot = f.service.room_snapshot(room).await.unwrap().unwrap();
        assert!(snapshot.votes.is_empty());
    }

    #[tokio::test]
    async fn snapshot_of_empty_room_is_none() {
        let f = fixture();
        assert!(f
            .service
            .room_snapshot(RoomId::new())
            .await
            .unwrap()
            .is_none());
    }
}
