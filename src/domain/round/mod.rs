//! Round module - the estimation round aggregate and its vocabulary.
//!
//! A round collects hidden votes while in Voting status, discloses them with
//! aggregate statistics on reveal, and can be reset for a re-vote.

pub mod consensus;
mod events;
mod round;
mod vote;

pub use consensus::{VoteStats, CONSENSUS_SPREAD};
pub use events::{
    ChatMessage, ParticipantJoined, ParticipantLeft, RevealedVote, RoundReset, RoundRevealed,
    RoundStarted, VoteRecorded,
};
pub use round::{Round, RoundStatus, MAX_STORY_TITLE_LENGTH};
pub use vote::{CardValue, Vote, MAX_CARD_VALUE_LENGTH};
