//! Message router - validates, authorizes, and dispatches inbound messages.
//!
//! Each envelope type maps to exactly one handler. Handlers validate their
//! own payload shape and the caller's role before touching the voting
//! service; any failure becomes an `error.v1` reply and never terminates
//! the connection. Broadcast effects (round events, chat) reach the caller
//! through the room channel, so most successful requests have no direct
//! reply.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::application::VotingService;
use crate::domain::foundation::{
    AuthenticatedParticipant, DomainError, ErrorCode, RoomEvent, RoomId,
};
use crate::domain::round::{
    CardValue, ChatMessage, RevealedVote, RoundRevealed, RoundStarted, RoundStatus, VoteStats,
};
use crate::ports::RoomBus;

use super::messages::{
    CastVotePayload, ChatPayload, ClientEnvelope, RoundTargetPayload, ServerEnvelope,
    StartRoundPayload,
};

/// Maximum length for a chat line.
pub const MAX_CHAT_LENGTH: usize = 500;

/// Per-connection context established at handshake.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub room_id: RoomId,
    pub participant: AuthenticatedParticipant,
}

/// Dispatches inbound envelopes to their handlers.
pub struct MessageRouter {
    voting: Arc<VotingService>,
    bus: Arc<dyn RoomBus>,
}

impl MessageRouter {
    /// Creates a router over the voting service and room bus.
    pub fn new(voting: Arc<VotingService>, bus: Arc<dyn RoomBus>) -> Self {
        Self { voting, bus }
    }

    /// Handles one raw inbound frame, returning the direct reply if any.
    ///
    /// Handler errors never propagate; they are mapped to `error.v1` here.
    pub async fn dispatch(&self, ctx: &ConnectionContext, raw: &str) -> Option<ServerEnvelope> {
        let envelope: ClientEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(room_id = %ctx.room_id, error = %e, "malformed inbound envelope");
                return Some(ServerEnvelope::error(
                    Uuid::new_v4(),
                    &DomainError::new(ErrorCode::InvalidPayload, "malformed message envelope"),
                ));
            }
        };

        let request_id = envelope.request_id;
        match self.handle(ctx, envelope).await {
            Ok(reply) => reply,
            Err(err) => {
                if matches!(err.code, ErrorCode::ServiceUnavailable | ErrorCode::Internal) {
                    tracing::error!(room_id = %ctx.room_id, error = %err, "request failed");
                } else {
                    tracing::debug!(room_id = %ctx.room_id, error = %err, "request rejected");
                }
                Some(ServerEnvelope::error(request_id, &err))
            }
        }
    }

    async fn handle(
        &self,
        ctx: &ConnectionContext,
        envelope: ClientEnvelope,
    ) -> Result<Option<ServerEnvelope>, DomainError> {
        let request_id = envelope.request_id;
        match envelope.message_type.as_str() {
            "room.join.v1" => self.handle_join(ctx, request_id).await,
            "vote.cast.v1" => {
                require_voter(ctx)?;
                let payload: CastVotePayload = parse(&envelope.payload)?;
                let card = CardValue::new(payload.card_value)
                    .map_err(|e| DomainError::new(ErrorCode::InvalidVote, e.to_string()))?;
                self.voting
                    .cast_vote(
                        ctx.room_id,
                        payload.round_id,
                        ctx.participant.id.clone(),
                        card,
                    )
                    .await?;
                Ok(None)
            }
            "round.start.v1" => {
                require_host(ctx)?;
                let payload: StartRoundPayload = parse(&envelope.payload)?;
                self.voting
                    .start_round(ctx.room_id, payload.story_title)
                    .await?;
                Ok(None)
            }
            "round.reveal.v1" => {
                require_host(ctx)?;
                let payload: RoundTargetPayload = parse(&envelope.payload)?;
                self.voting
                    .reveal_round(ctx.room_id, payload.round_id)
                    .await?;
                Ok(None)
            }
            "round.reset.v1" => {
                require_host(ctx)?;
                let payload: RoundTargetPayload = parse(&envelope.payload)?;
                self.voting.reset_round(ctx.room_id, payload.round_id).await?;
                Ok(None)
            }
            "chat.message.v1" => {
                let payload: ChatPayload = parse(&envelope.payload)?;
                let text = payload.text.trim().to_string();
                if text.is_empty() {
                    return Err(DomainError::invalid_payload("text", "chat text cannot be empty"));
                }
                if text.chars().count() > MAX_CHAT_LENGTH {
                    return Err(DomainError::invalid_payload(
                        "text",
                        format!("chat text exceeds {} characters", MAX_CHAT_LENGTH),
                    ));
                }
                self.bus
                    .publish(
                        ChatMessage {
                            participant_id: ctx.participant.id.clone(),
                            text,
                        }
                        .to_envelope(ctx.room_id),
                    )
                    .await?;
                Ok(None)
            }
            "pong" => Ok(None),
            other => Err(DomainError::new(
                ErrorCode::UnknownMessageType,
                format!("unknown message type: {}", other),
            )),
        }
    }

    /// Replays the room's current round to the requesting connection so a
    /// (re)joining client can reconcile without waiting for the next event.
    async fn handle_join(
        &self,
        ctx: &ConnectionContext,
        request_id: Uuid,
    ) -> Result<Option<ServerEnvelope>, DomainError> {
        let Some(snapshot) = self.voting.room_snapshot(ctx.room_id).await? else {
            return Ok(None);
        };

        let round = snapshot.round;
        let reply = match round.status() {
            RoundStatus::Voting => {
                let replay = RoundStarted {
                    round_id: *round.id(),
                    round_number: round.round_number(),
                    story_title: round.story_title().to_string(),
                };
                ServerEnvelope::reply(request_id, replay.event_type(), to_payload(&replay)?)
            }
            RoundStatus::Revealed => {
                let replay = RoundRevealed {
                    round_id: *round.id(),
                    votes: snapshot
                        .votes
                        .iter()
                        .map(|v| RevealedVote {
                            participant_id: v.participant_id().clone(),
                            card_value: v.card_value().clone(),
                        })
                        .collect(),
                    stats: round.stats().copied().unwrap_or_else(VoteStats::absent),
                };
                ServerEnvelope::reply(request_id, replay.event_type(), to_payload(&replay)?)
            }
        };

        Ok(Some(reply))
    }
}

fn parse<T: DeserializeOwned>(payload: &JsonValue) -> Result<T, DomainError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| DomainError::new(ErrorCode::InvalidPayload, format!("invalid payload: {}", e)))
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<JsonValue, DomainError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::new(ErrorCode::Internal, format!("payload encode: {}", e)))
}

fn require_host(ctx: &ConnectionContext) -> Result<(), DomainError> {
    if ctx.participant.role.can_manage_rounds() {
        Ok(())
    } else {
        Err(DomainError::forbidden_role(
            "only the host may manage rounds",
        ))
    }
}

fn require_voter(ctx: &ConnectionContext) -> Result<(), DomainError> {
    if ctx.participant.role.can_vote() {
        Ok(())
    } else {
        Err(DomainError::forbidden_role("observers cannot vote"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::{InMemoryBroker, InMemoryRoomBus};
    use crate::adapters::storage::InMemoryRoundStore;
    use crate::adapters::websocket::RoomRegistry;
    use crate::domain::foundation::{ParticipantId, ParticipantRole};

    struct Fixture {
        broker: Arc<InMemoryBroker>,
        voting: Arc<VotingService>,
        router: MessageRouter,
        room_id: RoomId,
    }

    fn fixture() -> Fixture {
        let broker = Arc::new(InMemoryBroker::new());
        let registry = Arc::new(RoomRegistry::with_default_capacity());
        let bus = InMemoryRoomBus::attach(Arc::clone(&broker), registry);
        let store = Arc::new(InMemoryRoundStore::new());
        let voting = Arc::new(VotingService::new(store, Arc::clone(&bus)));
        let router = MessageRouter::new(Arc::clone(&voting), bus);
        Fixture {
            broker,
            voting,
            router,
            room_id: RoomId::new(),
        }
    }

    fn ctx(fixture: &Fixture, id: &str, role: ParticipantRole) -> ConnectionContext {
        ConnectionContext {
            room_id: fixture.room_id,
            participant: AuthenticatedParticipant::new(
                ParticipantId::new(id).unwrap(),
                Some(id.to_string()),
                role,
            ),
        }
    }

    fn frame(message_type: &str, payload: JsonValue) -> String {
        serde_json::json!({
            "type": message_type,
            "requestId": Uuid::new_v4(),
            "payload": payload,
        })
        .to_string()
    }

    fn error_reason(reply: &ServerEnvelope) -> &str {
        assert_eq!(reply.message_type, "error.v1");
        reply.payload["reason"].as_str().unwrap()
    }

    #[tokio::test]
    async fn unknown_type_yields_unknown_message_type_without_side_effects() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);

        let reply = f
            .router
            .dispatch(&host, &frame("room.rename.v1", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "unknown_message_type");
        assert_eq!(reply.payload["code"], 4005);
        assert_eq!(f.broker.event_count(), 0);
    }

    #[tokio::test]
    async fn malformed_envelope_yields_invalid_payload() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);

        let reply = f.router.dispatch(&host, "{not json").await.unwrap();
        assert_eq!(error_reason(&reply), "invalid_payload");
    }

    #[tokio::test]
    async fn malformed_payload_yields_invalid_payload_without_mutation() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);

        let reply = f
            .router
            .dispatch(&host, &frame("round.start.v1", serde_json::json!({"title": 7})))
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "invalid_payload");
        assert!(f.voting.room_snapshot(f.room_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn host_start_succeeds_with_no_direct_reply() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);

        let reply = f
            .router
            .dispatch(
                &host,
                &frame("round.start.v1", serde_json::json!({"storyTitle": "Search"})),
            )
            .await;

        assert!(reply.is_none());
        assert!(f.broker.has_event("round.started.v1"));
    }

    #[tokio::test]
    async fn non_host_start_is_forbidden() {
        let f = fixture();
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let reply = f
            .router
            .dispatch(
                &voter,
                &frame("round.start.v1", serde_json::json!({"storyTitle": "Search"})),
            )
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "forbidden_role");
        assert_eq!(reply.payload["code"], 4004);
        assert!(!f.broker.has_event("round.started.v1"));
    }

    #[tokio::test]
    async fn non_host_reveal_is_forbidden_and_round_unchanged() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();
        f.voting
            .cast_vote(
                f.room_id,
                *round.id(),
                voter.participant.id.clone(),
                CardValue::new("5").unwrap(),
            )
            .await
            .unwrap();

        let reply = f
            .router
            .dispatch(
                &voter,
                &frame(
                    "round.reveal.v1",
                    serde_json::json!({"roundId": round.id()}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "forbidden_role");

        let snapshot = f.voting.room_snapshot(f.room_id).await.unwrap().unwrap();
        assert!(snapshot.round.is_voting());

        // The host can still reveal
        let reply = f
            .router
            .dispatch(
                &host,
                &frame(
                    "round.reveal.v1",
                    serde_json::json!({"roundId": round.id()}),
                ),
            )
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn observer_cast_is_forbidden() {
        let f = fixture();
        let observer = ctx(&f, "observer", ParticipantRole::Observer);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();

        let reply = f
            .router
            .dispatch(
                &observer,
                &frame(
                    "vote.cast.v1",
                    serde_json::json!({"roundId": round.id(), "cardValue": "5"}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "forbidden_role");
        assert!(!f.broker.has_event("vote.recorded.v1"));
    }

    #[tokio::test]
    async fn voter_cast_succeeds_silently() {
        let f = fixture();
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();

        let reply = f
            .router
            .dispatch(
                &voter,
                &frame(
                    "vote.cast.v1",
                    serde_json::json!({"roundId": round.id(), "cardValue": "8"}),
                ),
            )
            .await;

        assert!(reply.is_none());
        assert!(f.broker.has_event("vote.recorded.v1"));
    }

    #[tokio::test]
    async fn empty_card_value_is_invalid_vote() {
        let f = fixture();
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();

        let reply = f
            .router
            .dispatch(
                &voter,
                &frame(
                    "vote.cast.v1",
                    serde_json::json!({"roundId": round.id(), "cardValue": "  "}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "invalid_vote");
        assert_eq!(reply.payload["code"], 4002);
    }

    #[tokio::test]
    async fn cast_into_revealed_round_reports_invalid_state() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();
        f.voting
            .cast_vote(
                f.room_id,
                *round.id(),
                host.participant.id.clone(),
                CardValue::new("3").unwrap(),
            )
            .await
            .unwrap();
        f.voting.reveal_round(f.room_id, *round.id()).await.unwrap();

        let reply = f
            .router
            .dispatch(
                &voter,
                &frame(
                    "vote.cast.v1",
                    serde_json::json!({"roundId": round.id(), "cardValue": "5"}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(error_reason(&reply), "invalid_state");
        assert_eq!(reply.payload["code"], 4003);
    }

    #[tokio::test]
    async fn join_in_empty_room_has_no_reply() {
        let f = fixture();
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let reply = f
            .router
            .dispatch(&voter, &frame("room.join.v1", serde_json::json!({})))
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn join_replays_the_voting_round() {
        let f = fixture();
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();

        let reply = f
            .router
            .dispatch(&voter, &frame("room.join.v1", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(reply.message_type, "round.started.v1");
        assert_eq!(reply.payload["roundId"], round.id().to_string());
        assert_eq!(reply.payload["storyTitle"], "Search");
    }

    #[tokio::test]
    async fn join_replays_the_revealed_round_with_votes() {
        let f = fixture();
        let host = ctx(&f, "host", ParticipantRole::Host);

        let round = f
            .voting
            .start_round(f.room_id, "Search".to_string())
            .await
            .unwrap();
        f.voting
            .cast_vote(
                f.room_id,
                *round.id(),
                host.participant.id.clone(),
                CardValue::new("5").unwrap(),
            )
            .await
            .unwrap();
        f.voting.reveal_round(f.room_id, *round.id()).await.unwrap();

        let reply = f
            .router
            .dispatch(&host, &frame("room.join.v1", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(reply.message_type, "round.revealed.v1");
        assert_eq!(reply.payload["votes"].as_array().unwrap().len(), 1);
        assert_eq!(reply.payload["stats"]["consensus"], true);
    }

    #[tokio::test]
    async fn chat_broadcasts_and_validates_text() {
        let f = fixture();
        let observer = ctx(&f, "observer", ParticipantRole::Observer);

        let reply = f
            .router
            .dispatch(
                &observer,
                &frame("chat.message.v1", serde_json::json!({"text": "ready when you are"})),
            )
            .await;
        assert!(reply.is_none());

        let chats = f.broker.events_of_type("chat.message.v1");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].payload["text"], "ready when you are");
        assert_eq!(chats[0].payload["participantId"], "observer");

        let reply = f
            .router
            .dispatch(
                &observer,
                &frame("chat.message.v1", serde_json::json!({"text": "   "})),
            )
            .await
            .unwrap();
        assert_eq!(error_reason(&reply), "invalid_payload");
    }

    #[tokio::test]
    async fn pong_is_absorbed_silently() {
        let f = fixture();
        let voter = ctx(&f, "voter", ParticipantRole::Voter);

        let raw = serde_json::json!({"type": "pong", "requestId": Uuid::new_v4()}).to_string();
        assert!(f.router.dispatch(&voter, &raw).await.is_none());
    }
}
