//! Vote entity and card value token.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ParticipantId, RoundId, Timestamp, ValidationError};

/// Maximum length for a card value token.
pub const MAX_CARD_VALUE_LENGTH: usize = 8;

/// A card token as chosen from the deck.
///
/// Numeric tokens ("1", "13", "0.5") feed into statistics; non-numeric
/// tokens ("?", "∞", "☕") count as votes but are excluded from averages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardValue(String);

impl CardValue {
    /// Creates a card value, returning error on empty or oversized tokens.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(ValidationError::empty_field("card_value"));
        }
        if value.chars().count() > MAX_CARD_VALUE_LENGTH {
            return Err(ValidationError::too_long("card_value", MAX_CARD_VALUE_LENGTH));
        }
        Ok(Self(value))
    }

    /// Returns the inner token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the token as a finite number, if it is one.
    ///
    /// "inf"/"NaN" parse as f64 but are not estimation values.
    pub fn as_numeric(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

impl std::fmt::Display for CardValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant's vote in one round.
///
/// Unique per (round, participant); casting again replaces value and
/// timestamp rather than adding a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    round_id: RoundId,
    participant_id: ParticipantId,
    card_value: CardValue,
    voted_at: Timestamp,
}

impl Vote {
    /// Creates a vote stamped with the current time.
    pub fn new(round_id: RoundId, participant_id: ParticipantId, card_value: CardValue) -> Self {
        Self {
            round_id,
            participant_id,
            card_value,
            voted_at: Timestamp::now(),
        }
    }

    /// Reconstitute a vote from persistence.
    pub fn reconstitute(
        round_id: RoundId,
        participant_id: ParticipantId,
        card_value: CardValue,
        voted_at: Timestamp,
    ) -> Self {
        Self {
            round_id,
            participant_id,
            card_value,
            voted_at,
        }
    }

    /// Returns the round this vote targets.
    pub fn round_id(&self) -> &RoundId {
        &self.round_id
    }

    /// Returns the voter.
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Returns the chosen card.
    pub fn card_value(&self) -> &CardValue {
        &self.card_value
    }

    /// Returns when the vote was cast (or last replaced).
    pub fn voted_at(&self) -> &Timestamp {
        &self.voted_at
    }
}
