//! Application layer - services orchestrating domain logic over the ports.

mod voting;

pub use voting::{RoomSnapshot, VotingService};
