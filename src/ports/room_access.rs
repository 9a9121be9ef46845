//! RoomAccess port - handshake-time identity and membership checks.
//!
//! The voting engine does not own accounts or room membership; it consults
//! this port once per connection attempt, before the WebSocket upgrade.
//! Rejected attempts never reach handler code.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedParticipant, RoomId};

/// Port for validating a connection token against a room.
///
/// A successful call proves the token is valid, the room exists, and the
/// participant is a member; the returned participant carries the role used
/// for every later authorization check on the connection.
#[async_trait]
pub trait RoomAccess: Send + Sync {
    /// Validates the token and resolves the caller's membership in the room.
    async fn authorize(
        &self,
        room_id: &RoomId,
        token: &str,
    ) -> Result<AuthenticatedParticipant, AuthError>;
}
