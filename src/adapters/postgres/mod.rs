//! PostgreSQL adapters.

mod round_store;

pub use round_store::PostgresRoundStore;
