//! Pointdeck - Real-time estimation room backend.
//!
//! Participants join a shared room over WebSocket, cast hidden votes on a
//! story, and see results revealed simultaneously with aggregate
//! statistics. Rooms span server processes; a Redis-backed bus fans room
//! events to every process holding connections for the room.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
