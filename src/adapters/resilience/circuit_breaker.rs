//! In-process circuit breaker.
//!
//! State is guarded by a synchronous mutex that is never held across an
//! await, so the breaker can be shared freely between tasks.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::resilience::{Admission, BreakerState, CircuitBreakerConfig, CircuitState};
use crate::ports::{CircuitBreaker, CircuitBreakerMetrics};

/// Circuit breaker for one external dependency.
#[derive(Debug)]
pub struct InMemoryCircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl InMemoryCircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CircuitBreaker for InMemoryCircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        self.lock().status()
    }

    fn try_acquire(&self) -> Admission {
        let mut state = self.lock();
        let before = state.status();
        let admission = state.admit(&self.config, Instant::now());
        if before != state.status() {
            info!(breaker = %self.name, "Circuit half-open, probing dependency");
        }
        admission
    }

    fn record_success(&self) {
        if let Some(CircuitState::Closed) = self.lock().on_success(&self.config) {
            info!(breaker = %self.name, "Circuit closed");
        }
    }

    fn record_failure(&self) {
        let mut state = self.lock();
        if let Some(CircuitState::Open) = state.on_failure(&self.config, Instant::now()) {
            warn!(
                breaker = %self.name,
                consecutive_failures = state.consecutive_failures(),
                reset_timeout_secs = self.config.reset_timeout.as_secs(),
                "Circuit opened"
            );
        }
    }

    fn reset(&self) {
        self.lock().reset();
        info!(breaker = %self.name, "Circuit manually reset");
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: Some(state.status()),
            total_successes: state.total_successes(),
            total_failures: state.total_failures(),
            total_rejections: state.total_rejections(),
            times_opened: state.times_opened(),
            current_failures: state.consecutive_failures(),
            current_successes: state.consecutive_successes(),
            time_until_half_open: state.time_until_half_open(&self.config, Instant::now()),
        }
    }
}
