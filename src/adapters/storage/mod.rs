//! In-memory storage adapters for tests and local development.

mod in_memory_round_store;

pub use in_memory_round_store::InMemoryRoundStore;
