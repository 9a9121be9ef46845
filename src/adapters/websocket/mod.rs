//! WebSocket adapters: gateway, registry, router, and timer state machines.

mod gateway;
mod heartbeat;
mod messages;
mod reconnect;
mod registry;
mod router;

pub use gateway::{room_routes, ws_handler, GatewayState};
pub use heartbeat::HeartbeatMonitor;
pub use messages::{
    CastVotePayload, ChatPayload, ClientEnvelope, ErrorPayload, RoundTargetPayload,
    ServerEnvelope, StartRoundPayload,
};
pub use reconnect::{ConnectionState, ReconnectDirective, ReconnectPolicy, ReconnectStateMachine};
pub use registry::{ConnectionId, RoomRegistry};
pub use router::{ConnectionContext, MessageRouter, MAX_CHAT_LENGTH};
