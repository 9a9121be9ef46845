//! Authentication and role types for the domain layer.
//!
//! These types represent a participant admitted to a room after token
//! validation. They have no provider dependencies; any identity provider can
//! populate them via the `RoomAccess` port.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ParticipantId;

/// A participant's role within one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Runs the session: may start, reveal, and reset rounds.
    Host,
    /// Casts votes.
    Voter,
    /// Watches only; may chat but never votes or manages rounds.
    Observer,
}

impl ParticipantRole {
    /// Whether this role may start, reveal, or reset rounds.
    pub fn can_manage_rounds(&self) -> bool {
        matches!(self, ParticipantRole::Host)
    }

    /// Whether this role may cast votes. Hosts vote too; observers never do.
    pub fn can_vote(&self) -> bool {
        !matches!(self, ParticipantRole::Observer)
    }

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Host => "host",
            ParticipantRole::Voter => "voter",
            ParticipantRole::Observer => "observer",
        }
    }
}

impl std::str::FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(ParticipantRole::Host),
            "voter" => Ok(ParticipantRole::Voter),
            "observer" => Ok(ParticipantRole::Observer),
            other => Err(format!("unknown participant role: {}", other)),
        }
    }
}

/// Participant admitted to a room after handshake validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedParticipant {
    /// Identity from the external provider.
    pub id: ParticipantId,

    /// Display name if the token carried one.
    pub display_name: Option<String>,

    /// Role within the room being joined.
    pub role: ParticipantRole,
}

impl AuthenticatedParticipant {
    /// Creates a new authenticated participant.
    pub fn new(id: ParticipantId, display_name: Option<String>, role: ParticipantRole) -> Self {
        Self {
            id,
            display_name,
            role,
        }
    }
}

/// Errors raised during connection handshake validation.
///
/// These never reach message handlers; a failed handshake is rejected
/// before the WebSocket upgrade.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired (separate from InvalidToken for specific handling).
    #[error("Token expired")]
    TokenExpired,

    /// The room in the connection target does not exist.
    #[error("Room not found")]
    RoomNotFound,

    /// Token is valid but the participant is not a member of this room.
    #[error("Not a member of this room")]
    NotAMember,

    /// The identity service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}
