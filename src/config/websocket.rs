//! WebSocket connection configuration.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Heartbeat and fan-out tuning for room connections.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Seconds between server liveness probes.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds of silence after which a connection is torn down as stale.
    #[serde(default = "default_pong_deadline")]
    pub pong_deadline_secs: u64,

    /// Buffer size of each room's broadcast channel. Larger values absorb
    /// bursts at the cost of memory; lagging clients resync via replay.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl WebSocketConfig {
    /// Probe interval as a Duration.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Stale deadline as a Duration.
    pub fn pong_deadline(&self) -> Duration {
        Duration::from_secs(self.pong_deadline_secs)
    }

    /// Validate WebSocket configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pong_deadline_secs <= self.ping_interval_secs {
            return Err(ValidationError::HeartbeatDeadlineTooShort {
                interval_secs: self.ping_interval_secs,
                deadline_secs: self.pong_deadline_secs,
            });
        }
        Ok(())
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_deadline_secs: default_pong_deadline(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_deadline() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_probe_every_30s_with_60s_deadline() {
        let config = WebSocketConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
        assert_eq!(config.pong_deadline(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deadline_must_exceed_probe_interval() {
        let config = WebSocketConfig {
            ping_interval_secs: 30,
            pong_deadline_secs: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
