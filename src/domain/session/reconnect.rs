//! Reconnect backoff policy.

use std::time::Duration;

/// Bounded exponential backoff for automatic reconnects, plus the
/// keep-alive cadence of a connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts allowed before the session gives up. Default: 5
    pub max_attempts: u32,
    /// Delay before the first attempt. Default: 1s
    pub base_delay: Duration,
    /// Upper bound on any single delay. Default: 5s
    pub max_delay: Duration,
    /// Ping period while connected. Must stay well inside the relay's
    /// staleness threshold. Default: 10s
    pub heartbeat_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt: base doubling, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Heartbeat period, never zero.
    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_interval.max(Duration::from_millis(1))
    }

    /// True once `attempt` attempts have been used up.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
