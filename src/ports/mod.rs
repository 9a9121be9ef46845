//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the voting engine and the outside world. Adapters implement these ports.
//!
//! - `RoundStore` - durable Round/Vote storage (shared across processes)
//! - `RoomBus` - cross-process room event fan-out
//! - `RoomAccess` - handshake identity/membership validation

mod room_access;
mod room_bus;
mod round_store;

pub use room_access::RoomAccess;
pub use room_bus::RoomBus;
pub use round_store::RoundStore;
