//! Mock RoomAccess adapter for tests.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedParticipant, RoomId};
use crate::ports::RoomAccess;

/// In-memory grants: token → (room, participant).
#[derive(Default)]
pub struct MockRoomAccess {
    rooms: RwLock<HashSet<RoomId>>,
    grants: RwLock<HashMap<String, (RoomId, AuthenticatedParticipant)>>,
}

impl MockRoomAccess {
    /// Creates an empty mock with no rooms and no grants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a room so it resolves as existing.
    pub fn add_room(&self, room_id: RoomId) {
        self.rooms
            .write()
            .expect("MockRoomAccess: rooms lock poisoned")
            .insert(room_id);
    }

    /// Grants a token access to a room as the given participant.
    pub fn grant(&self, token: impl Into<String>, room_id: RoomId, participant: AuthenticatedParticipant) {
        self.add_room(room_id);
        self.grants
            .write()
            .expect("MockRoomAccess: grants lock poisoned")
            .insert(token.into(), (room_id, participant));
    }
}

#[async_trait]
impl RoomAccess for MockRoomAccess {
    async fn authorize(
        &self,
        room_id: &RoomId,
        token: &str,
    ) -> Result<AuthenticatedParticipant, AuthError> {
        if !self
            .rooms
            .read()
            .expect("MockRoomAccess: rooms lock poisoned")
            .contains(room_id)
        {
            return Err(AuthError::RoomNotFound);
        }

        let grants = self
            .grants
            .read()
            .expect("MockRoomAccess: grants lock poisoned");
        match grants.get(token) {
            Some((granted_room, participant)) if granted_room == room_id => {
                Ok(participant.clone())
            }
            Some(_) => Err(AuthError::NotAMember),
            None => Err(AuthError::InvalidToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ParticipantId, ParticipantRole};

    fn participant(id: &str, role: ParticipantRole) -> AuthenticatedParticipant {
        AuthenticatedParticipant::new(ParticipantId::new(id).unwrap(), None, role)
    }

    #[tokio::test]
    async fn granted_token_authorizes() {
        let access = MockRoomAccess::new();
        let room = RoomId::new();
        access.grant("tok-1", room, participant("p-1", ParticipantRole::Voter));

        let admitted = access.authorize(&room, "tok-1").await.unwrap();
        assert_eq!(admitted.id.as_str(), "p-1");
    }

    #[tokio::test]
    async fn unknown_room_is_room_not_found() {
        let access = MockRoomAccess::new();
        let err = access.authorize(&RoomId::new(), "tok-1").await.unwrap_err();
        assert!(matches!(err, AuthError::RoomNotFound));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let access = MockRoomAccess::new();
        let room = RoomId::new();
        access.add_room(room);

        let err = access.authorize(&room, "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn token_for_other_room_is_not_a_member() {
        let access = MockRoomAccess::new();
        let room_a = RoomId::new();
        let room_b = RoomId::new();
        access.grant("tok-1", room_a, participant("p-1", ParticipantRole::Voter));
        access.add_room(room_b);

        let err = access.authorize(&room_b, "tok-1").await.unwrap_err();
        assert!(matches!(err, AuthError::NotAMember));
    }
}
