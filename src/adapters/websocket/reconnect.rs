//! Client-side reconnection state machine.
//!
//! Models the connect / connected / disconnected lifecycle with bounded
//! exponential backoff, independent of any socket library or timer
//! primitive: the machine hands back delays and the caller owns (and may
//! cancel) the actual timers. Connection drivers embed this to decide when
//! to dial again and when to give up.

use std::time::Duration;

/// Backoff policy for reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry; doubles on each failed attempt.
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Attempts before the machine gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

/// Where the connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A dial is in flight.
    Connecting { attempt: u32 },
    /// The socket is up; heartbeats are flowing.
    Connected,
    /// No socket and no dial in flight (initial, backing off, or given up).
    Disconnected,
}

/// What the driver should do after a connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDirective {
    /// Schedule a (cancellable) timer and dial again when it fires.
    RetryIn(Duration),
    /// Retry budget exhausted; stay disconnected.
    GiveUp,
}

/// Timer-driven reconnection state machine.
#[derive(Debug)]
pub struct ReconnectStateMachine {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failed_attempts: u32,
}

impl ReconnectStateMachine {
    /// Creates a machine in the Disconnected state.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            failed_attempts: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The driver started a dial (initially or when a retry timer fired).
    pub fn on_connect_started(&mut self) {
        self.state = ConnectionState::Connecting {
            attempt: self.failed_attempts + 1,
        };
    }

    /// The socket came up; the failure streak resets.
    pub fn on_connected(&mut self) {
        self.failed_attempts = 0;
        self.state = ConnectionState::Connected;
    }

    /// The dial failed or an established socket dropped.
    ///
    /// Returns the directive for the driver; the machine lands in
    /// Disconnected either way.
    pub fn on_connection_lost(&mut self) -> ReconnectDirective {
        self.failed_attempts += 1;
        self.state = ConnectionState::Disconnected;

        if self.failed_attempts >= self.policy.max_attempts {
            return ReconnectDirective::GiveUp;
        }

        ReconnectDirective::RetryIn(self.backoff_delay())
    }

    fn backoff_delay(&self) -> Duration {
        // Cap the exponent so the multiplier cannot overflow
        let exponent = (self.failed_attempts - 1).min(6);
        let delay = self.policy.base_delay * 2u32.pow(exponent);
        delay.min(self.policy.max_delay)
    }
}
