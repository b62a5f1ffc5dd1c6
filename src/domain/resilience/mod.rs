//! Failure-isolation state for calls to external dependencies.

mod breaker;

pub use breaker::{Admission, BreakerState, CircuitBreakerConfig, CircuitState};
