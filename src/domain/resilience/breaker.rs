//! Circuit breaker state machine.
//!
//! ```text
//! Closed --[failure_threshold consecutive failures]--> Open
//! Open --[reset_timeout elapsed, checked on next call]--> HalfOpen
//! HalfOpen --[success_threshold consecutive successes]--> Closed
//! HalfOpen --[any failure]--> Open
//! ```
//!
//! There is no background timer. The Open → HalfOpen move happens lazily
//! inside [`BreakerState::admit`], so an idle breaker owns no tasks.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::domain::foundation::StateMachine;

/// Circuit breaker states for external service protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests flow through to the service.
    Closed,

    /// Too many failures - requests rejected immediately without calling service.
    Open,

    /// Probing recovery - requests flow, one failure reopens.
    HalfOpen,
}

impl CircuitState {
    /// Check if the circuit allows requests through.
    pub fn allows_requests(&self) -> bool {
        matches!(self, CircuitState::Closed | CircuitState::HalfOpen)
    }
}

impl StateMachine for CircuitState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use CircuitState::*;
        matches!(
            (self, target),
            (Closed, Open) | (Open, HalfOpen) | (HalfOpen, Closed) | (HalfOpen, Open)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use CircuitState::*;
        match self {
            Closed => vec![Open],
            Open => vec![HalfOpen],
            HalfOpen => vec![Closed, Open],
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit.
    ///
    /// Default: 5 failures
    pub failure_threshold: u32,

    /// Time since the last failure before a call may probe recovery.
    ///
    /// Default: 60 seconds
    pub reset_timeout: Duration,

    /// Number of successes in half-open state needed to close circuit.
    ///
    /// Default: 3 successes
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Fail fast; `retry_after` is the time left until a probe is allowed.
    Rejected { retry_after: Duration },
}

/// Mutable breaker bookkeeping.
#[derive(Debug, Clone)]
pub struct BreakerState {
    status: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
    times_opened: u64,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerState {
    pub fn new() -> Self {
        Self {
            status: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
            times_opened: 0,
        }
    }

    pub fn status(&self) -> CircuitState {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn last_failure_at(&self) -> Option<Instant> {
        self.last_failure_at
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn total_rejections(&self) -> u64 {
        self.total_rejections
    }

    pub fn times_opened(&self) -> u64 {
        self.times_opened
    }

    /// Time left before an open circuit lets a probe through.
    pub fn time_until_half_open(&self, config: &CircuitBreakerConfig, now: Instant) -> Option<Duration> {
        if self.status != CircuitState::Open {
            return None;
        }
        let elapsed = self
            .last_failure_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(config.reset_timeout);
        Some(config.reset_timeout.saturating_sub(elapsed))
    }

    /// Decides whether a call may run, moving Open → HalfOpen when due.
    pub fn admit(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        match self.status {
            CircuitState::Closed | CircuitState::HalfOpen => Admission::Allowed,
            CircuitState::Open => {
                let retry_after = self.time_until_half_open(config, now).unwrap_or_default();
                if retry_after.is_zero() {
                    self.move_to(CircuitState::HalfOpen);
                    self.consecutive_successes = 0;
                    Admission::Allowed
                } else {
                    self.total_rejections += 1;
                    Admission::Rejected { retry_after }
                }
            }
        }
    }

    /// Records a successful call. Returns the new state if it changed.
    pub fn on_success(&mut self, config: &CircuitBreakerConfig) -> Option<CircuitState> {
        self.total_successes += 1;
        match self.status {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= config.success_threshold {
                    self.move_to(CircuitState::Closed);
                    self.consecutive_failures = 0;
                    self.consecutive_successes = 0;
                    Some(CircuitState::Closed)
                } else {
                    None
                }
            }
            // A call admitted before another one reopened the circuit.
            CircuitState::Open => None,
        }
    }

    /// Records a failed call. Returns the new state if it changed.
    pub fn on_failure(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Option<CircuitState> {
        self.total_failures += 1;
        self.last_failure_at = Some(now);
        match self.status {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= config.failure_threshold {
                    self.open();
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                self.open();
                self.consecutive_failures = 1;
                Some(CircuitState::Open)
            }
            CircuitState::Open => {
                self.consecutive_failures += 1;
                None
            }
        }
    }

    /// Forces the circuit closed and clears the consecutive counters.
    pub fn reset(&mut self) {
        self.status = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.last_failure_at = None;
    }

    fn open(&mut self) {
        self.move_to(CircuitState::Open);
        self.consecutive_successes = 0;
        self.times_opened += 1;
    }

    fn move_to(&mut self, target: CircuitState) {
        debug_assert!(
            self.status.can_transition_to(&target),
            "illegal breaker transition {:?} -> {:?}",
            self.status,
            target
        );
        self.status = target;
    }
}
