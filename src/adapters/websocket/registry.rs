//! Per-process connection registry with room-scoped fan-out.
//!
//! Rooms are organized by room ID; each room owns a broadcast channel that
//! fans inbound bus envelopes out to every locally attached connection.
//!
//! # Architecture
//!
//! ```text
//! Room: room-123        Room: room-456
//! ├── connection-a      ├── connection-d
//! ├── connection-b      └── connection-e
//! └── connection-c
//! ```
//!
//! The registry is lifecycle-scoped and injected into the gateway and bus
//! adapter; it is never a process-global. Join and leave report the 0→1 and
//! 1→0 transitions of the per-room connection counter so the gateway can
//! drive bus subscribe/unsubscribe.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::foundation::{EventEnvelope, RoomId};

/// Unique identifier for one attached WebSocket connection.
///
/// Generated server-side when a client connects; process-local and
/// ephemeral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct RoomEntry {
    sender: broadcast::Sender<EventEnvelope>,
    connections: usize,
}

/// Concurrent index of room → locally attached connections.
///
/// # Thread Safety
///
/// Uses `RwLock` for the room map since fan-out (reads) vastly outnumbers
/// joins and leaves (writes). Delivery through the broadcast channel skips
/// receivers that closed mid-delivery without raising.
pub struct RoomRegistry {
    /// Map of room_id → broadcast channel and connection counter.
    rooms: RwLock<HashMap<RoomId, RoomEntry>>,

    /// Map of connection_id → room_id for O(1) cleanup on disconnect.
    connection_rooms: RwLock<HashMap<ConnectionId, RoomId>>,

    /// Channel capacity for each room's broadcast channel.
    channel_capacity: usize,
}

impl RoomRegistry {
    /// Create a new registry with the given per-room channel capacity.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            connection_rooms: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Create with default capacity (128 envelopes).
    pub fn with_default_capacity() -> Self {
        Self::new(128)
    }

    /// Attach a connection to a room.
    ///
    /// Returns a receiver for the room's envelopes and `true` when this
    /// connection took the room's local counter from 0 to 1 (the gateway
    /// subscribes to the room's bus channel on that transition).
    pub async fn join(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
    ) -> (broadcast::Receiver<EventEnvelope>, bool) {
        let mut rooms = self.rooms.write().await;

        let entry = rooms.entry(*room_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.channel_capacity);
            RoomEntry {
                sender: tx,
                connections: 0,
            }
        });
        entry.connections += 1;
        let first = entry.connections == 1;
        let receiver = entry.sender.subscribe();

        self.connection_rooms
            .write()
            .await
            .insert(connection_id, *room_id);

        (receiver, first)
    }

    /// Detach a connection from its room.
    ///
    /// Returns the room and `true` when this was the room's last local
    /// connection (the gateway unsubscribes from the bus on that
    /// transition). Returns `None` for an unknown connection, so teardown
    /// is naturally idempotent.
    pub async fn leave(&self, connection_id: &ConnectionId) -> Option<(RoomId, bool)> {
        let room_id = self
            .connection_rooms
            .write()
            .await
            .remove(connection_id)?;

        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get_mut(&room_id) else {
            return Some((room_id, false));
        };

        entry.connections = entry.connections.saturating_sub(1);
        let last = entry.connections == 0;
        if last {
            rooms.remove(&room_id);
        }

        Some((room_id, last))
    }

    /// Fan an envelope out to every connection in a room.
    ///
    /// A room with no local connections is a no-op (legitimate race with
    /// unsubscribe); send errors from closed receivers are ignored.
    pub async fn deliver(&self, room_id: &RoomId, envelope: EventEnvelope) {
        let rooms = self.rooms.read().await;

        if let Some(entry) = rooms.get(room_id) {
            let _ = entry.sender.send(envelope);
        }
    }

    /// Count of connections currently attached to a room.
    pub async fn connection_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|entry| entry.connections)
            .unwrap_or(0)
    }

    /// All rooms with at least one local connection.
    pub async fn active_rooms(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().copied().collect()
    }

    /// Total connections across all rooms on this process.
    pub async fn total_connections(&self) -> usize {
        self.connection_rooms.read().await.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
