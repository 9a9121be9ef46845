//! Heartbeat deadline bookkeeping.
//!
//! The gateway probes each connection on a fixed interval and tears down
//! connections whose most recent acknowledgement is older than the deadline.
//! The bookkeeping lives here as an explicit state machine, separate from
//! the socket loop, so the stale rule is testable without timers or I/O.

use std::time::{Duration, Instant};

/// Tracks one connection's liveness against a fixed deadline.
///
/// Any inbound frame counts as acknowledgement, with the `pong` envelope
/// being the guaranteed response to a probe.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    last_ack: Instant,
    deadline: Duration,
}

impl HeartbeatMonitor {
    /// Creates a monitor; the connection is considered live at creation.
    pub fn new(deadline: Duration) -> Self {
        Self::starting_at(deadline, Instant::now())
    }

    /// Creates a monitor with an explicit start time.
    pub fn starting_at(deadline: Duration, now: Instant) -> Self {
        Self {
            last_ack: now,
            deadline,
        }
    }

    /// Records an acknowledgement (any inbound frame).
    pub fn record_ack(&mut self, at: Instant) {
        self.last_ack = at;
    }

    /// Whether the connection has exceeded its deadline at probe time.
    pub fn is_stale(&self, at: Instant) -> bool {
        at.saturating_duration_since(self.last_ack) > self.deadline
    }

    /// Time since the most recent acknowledgement.
    pub fn silence(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.last_ack)
    }
}
