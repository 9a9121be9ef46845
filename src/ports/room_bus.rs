//! RoomBus port - cross-process fan-out of room events.
//!
//! One shared channel exists per room. A process subscribes while it has at
//! least one local connection in the room and unsubscribes when the last one
//! leaves; the gateway drives those transitions. Delivery is at-least-once
//! with no cross-process total ordering, so consumers treat envelopes as
//! idempotent, latest-wins notifications.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope, RoomId};

/// Port for publishing and subscribing to room-scoped events.
///
/// Implementations must:
/// - reference-count subscriptions per room so repeated `subscribe` calls
///   never create duplicate upstream subscriptions
/// - forward inbound envelopes verbatim to the local registry, never
///   re-publish them (prevents broadcast loops)
/// - tolerate inbound delivery for a room with zero local connections
///   (legitimate race with unsubscribe; silently dropped)
/// - retry transient publish failures with backoff before surfacing
///   `ServiceUnavailable`
#[async_trait]
pub trait RoomBus: Send + Sync {
    /// Publishes an envelope on the room's shared channel. Fire-and-forget:
    /// no delivery acknowledgment beyond the broker accepting the message.
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), DomainError>;

    /// Registers interest in a room's channel (reference-counted).
    async fn subscribe(&self, room_id: &RoomId) -> Result<(), DomainError>;

    /// Releases one reference to a room's channel; the upstream
    /// subscription ends when the count reaches zero.
    async fn unsubscribe(&self, room_id: &RoomId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn RoomBus) {}

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
}
