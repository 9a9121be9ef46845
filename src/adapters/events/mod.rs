//! Event bus adapters.
//!
//! Two implementations of the `RoomBus` port: a Redis pub/sub adapter for
//! production and an in-memory broker double for deterministic
//! multi-process simulation in tests.

mod in_memory;
mod redis_bus;

pub use in_memory::{InMemoryBroker, InMemoryRoomBus};
pub use redis_bus::{RedisRoomBus, RetryPolicy};
