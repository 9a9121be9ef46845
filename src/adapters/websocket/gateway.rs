//! Connection gateway - WebSocket upgrade and connection lifecycle.
//!
//! Route: `GET /rooms/:room_id/live?token=...`
//!
//! The handshake validates the token and room membership through the
//! `RoomAccess` port before the upgrade; rejected attempts never reach
//! handler code. An admitted connection:
//!
//! 1. joins the registry (a 0→1 room transition subscribes the bus)
//! 2. announces itself with `participant_joined.v1`
//! 3. loops over inbound frames, room broadcasts, and heartbeat probes
//! 4. converges every exit path - graceful close, protocol error, stale
//!    heartbeat - onto one teardown that leaves the registry (1→0
//!    unsubscribes the bus) and announces `participant_left.v1` once.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::WebSocketConfig;
use crate::domain::foundation::{
    AuthError, AuthenticatedParticipant, RoomEvent, RoomId,
};
use crate::domain::round::{ParticipantJoined, ParticipantLeft};
use crate::ports::{RoomAccess, RoomBus};

use super::heartbeat::HeartbeatMonitor;
use super::messages::ServerEnvelope;
use super::registry::{ConnectionId, RoomRegistry};
use super::router::{ConnectionContext, MessageRouter};

/// State required for WebSocket handling, injected per process.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<RoomRegistry>,
    pub bus: Arc<dyn RoomBus>,
    pub router: Arc<MessageRouter>,
    pub access: Arc<dyn RoomAccess>,
    pub settings: WebSocketConfig,
}

/// Why a connection ended; every variant funnels into the same teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    Stale,
    TransportError,
    ProtocolError,
    SendFailed,
    SubscribeFailed,
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    token: Option<String>,
}

/// Handle WebSocket upgrade requests for a room.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    State(state): State<GatewayState>,
) -> Response {
    let Ok(room_id) = room_id.parse::<RoomId>() else {
        return rejection(StatusCode::NOT_FOUND, 4001, "room_not_found", "Unknown room");
    };

    let Some(token) = bearer_token(&headers).or(query.token) else {
        return rejection(
            StatusCode::UNAUTHORIZED,
            4000,
            "unauthorized",
            "Missing authentication token",
        );
    };

    match state.access.authorize(&room_id, &token).await {
        Ok(participant) => {
            ws.on_upgrade(move |socket| handle_socket(socket, room_id, participant, state))
        }
        Err(err) => auth_rejection(err),
    }
}

/// Extracts a bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn rejection(status: StatusCode, code: u16, reason: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "code": code,
            "reason": reason,
            "message": message,
        })),
    )
        .into_response()
}

fn auth_rejection(err: AuthError) -> Response {
    match err {
        AuthError::InvalidToken | AuthError::TokenExpired => rejection(
            StatusCode::UNAUTHORIZED,
            4000,
            "unauthorized",
            "Invalid or expired token",
        ),
        AuthError::NotAMember => rejection(
            StatusCode::FORBIDDEN,
            4000,
            "unauthorized",
            "Not a member of this room",
        ),
        AuthError::RoomNotFound => {
            rejection(StatusCode::NOT_FOUND, 4001, "room_not_found", "Unknown room")
        }
        AuthError::ServiceUnavailable(detail) => {
            tracing::error!(error = %detail, "auth service unavailable during handshake");
            rejection(
                StatusCode::SERVICE_UNAVAILABLE,
                4007,
                "service_unavailable",
                "Authentication service unavailable",
            )
        }
    }
}

/// Runs for the lifetime of one admitted connection.
async fn handle_socket(
    socket: WebSocket,
    room_id: RoomId,
    participant: AuthenticatedParticipant,
    state: GatewayState,
) {
    let connection_id = ConnectionId::new();
    let (mut sender, mut receiver) = socket.split();

    let (mut room_rx, first_in_room) = state.registry.join(&room_id, connection_id).await;

    if first_in_room {
        if let Err(err) = state.bus.subscribe(&room_id).await {
            tracing::error!(room_id = %room_id, error = %err, "bus subscribe failed, refusing connection");
            let _ = send_text(
                &mut sender,
                ServerEnvelope::error(uuid::Uuid::new_v4(), &err).to_json(),
            )
            .await;
            teardown(&state, connection_id, &participant, CloseReason::SubscribeFailed).await;
            return;
        }
    }

    tracing::debug!(
        room_id = %room_id,
        connection_id = %connection_id,
        participant_id = %participant.id,
        role = participant.role.as_str(),
        "connection established"
    );

    let joined = ParticipantJoined {
        participant_id: participant.id.clone(),
        display_name: participant.display_name.clone(),
        role: participant.role,
    };
    if let Err(err) = state.bus.publish(joined.to_envelope(room_id)).await {
        tracing::warn!(room_id = %room_id, error = %err, "participant_joined publish failed");
    }

    let ctx = ConnectionContext {
        room_id,
        participant: participant.clone(),
    };

    let mut monitor = HeartbeatMonitor::new(state.settings.pong_deadline());
    let ping_interval = state.settings.ping_interval();
    let mut probes =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    probes.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            // Liveness probe; also the point where stale connections die
            _ = probes.tick() => {
                if monitor.is_stale(Instant::now()) {
                    tracing::debug!(
                        connection_id = %connection_id,
                        silent_for = ?monitor.silence(Instant::now()),
                        "connection stale, closing"
                    );
                    break CloseReason::Stale;
                }
                if send_text(&mut sender, ServerEnvelope::ping().to_json()).await.is_err() {
                    break CloseReason::SendFailed;
                }
            }

            // Room fan-out from the bus via the registry
            broadcast = room_rx.recv() => {
                match broadcast {
                    Ok(envelope) => {
                        let wire = ServerEnvelope::event(&envelope).to_json();
                        if send_text(&mut sender, wire).await.is_err() {
                            break CloseReason::SendFailed;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Slow consumer; it reconciles via room.join.v1 replay
                        tracing::warn!(
                            connection_id = %connection_id,
                            missed,
                            "connection lagged behind room broadcasts"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break CloseReason::TransportError;
                    }
                }
            }

            // Inbound frames; handled sequentially per connection
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        monitor.record_ack(Instant::now());
                        if let Some(reply) = state.router.dispatch(&ctx, &text).await {
                            if send_text(&mut sender, reply.to_json()).await.is_err() {
                                break CloseReason::SendFailed;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        monitor.record_ack(Instant::now());
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(connection_id = %connection_id, "binary frame on text protocol");
                        break CloseReason::ProtocolError;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break CloseReason::ClientClosed;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "receive error");
                        break CloseReason::TransportError;
                    }
                }
            }
        }
    };

    teardown(&state, connection_id, &participant, reason).await;
}

/// Single teardown path for every way a connection can end.
///
/// Registry leave is idempotent, so `participant_left.v1` goes out exactly
/// once per connection.
async fn teardown(
    state: &GatewayState,
    connection_id: ConnectionId,
    participant: &AuthenticatedParticipant,
    reason: CloseReason,
) {
    let Some((room_id, last_in_room)) = state.registry.leave(&connection_id).await else {
        return;
    };

    if last_in_room {
        if let Err(err) = state.bus.unsubscribe(&room_id).await {
            tracing::warn!(room_id = %room_id, error = %err, "bus unsubscribe failed during teardown");
        }
    }

    let left = ParticipantLeft {
        participant_id: participant.id.clone(),
    };
    if let Err(err) = state.bus.publish(left.to_envelope(room_id)).await {
        tracing::warn!(room_id = %room_id, error = %err, "participant_left publish failed");
    }

    tracing::debug!(
        room_id = %room_id,
        connection_id = %connection_id,
        participant_id = %participant.id,
        reason = ?reason,
        "connection closed"
    );
}

async fn send_text(
    sender: &mut SplitSink<WebSocket, Message>,
    text: String,
) -> Result<(), axum::Error> {
    sender.send(Message::Text(text)).await
}

/// Create the axum router for the room WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(room_routes())
///     .with_state(gateway_state);
/// ```
pub fn room_routes() -> axum::Router<GatewayState> {
    use axum::routing::get;

    axum::Router::new().route("/rooms/:room_id/live", get(ws_handler))
}
