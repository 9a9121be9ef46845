//! JWT implementation of the RoomAccess port.
//!
//! Tokens are minted by the external room service after it has checked
//! membership; each token is scoped to a single room and carries the
//! participant's role. This adapter only verifies the signature and claims -
//! it never consults the room service on the hot path.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::domain::foundation::{
    AuthError, AuthenticatedParticipant, ParticipantId, ParticipantRole, RoomId,
};
use crate::ports::RoomAccess;

/// Claims expected in a room connection token.
#[derive(Debug, Deserialize)]
struct RoomClaims {
    /// Participant identity.
    sub: String,

    /// Display name, if the identity provider supplied one.
    name: Option<String>,

    /// Room this token grants access to.
    room: String,

    /// Role within that room.
    role: String,

    /// Expiry (validated by jsonwebtoken).
    #[allow(dead_code)]
    exp: usize,
}

/// HS256 token validator.
pub struct JwtRoomAccess {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtRoomAccess {
    /// Creates a validator over the shared signing secret.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl RoomAccess for JwtRoomAccess {
    async fn authorize(
        &self,
        room_id: &RoomId,
        token: &str,
    ) -> Result<AuthenticatedParticipant, AuthError> {
        let claims = decode::<RoomClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        if claims.room != room_id.to_string() {
            return Err(AuthError::NotAMember);
        }

        let role: ParticipantRole = claims.role.parse().map_err(|_| AuthError::InvalidToken)?;
        let id = ParticipantId::new(claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthenticatedParticipant::new(id, claims.name, role))
    }
}
