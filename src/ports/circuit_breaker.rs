//! CircuitBreaker port - Interface for external dependency resilience.
//!
//! The circuit breaker stops calling a failing dependency (the video
//! provider control API) for a cool-down period, turning hangs into fast,
//! predictable failures.
//!
//! One breaker instance exists per distinct external endpoint. The state
//! rules live in [`crate::domain::resilience`]; this port is what callers
//! hold, and [`execute`] is the usual way to run a call through it.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use crate::domain::resilience::{Admission, CircuitBreakerConfig, CircuitState};

/// Port for circuit breaker functionality.
///
/// # Example
///
/// ```ignore
/// let outcome = execute(breaker.as_ref(), VideoProviderError::is_transient, || {
///     provider.health_check()
/// })
/// .await;
///
/// match outcome {
///     Err(CircuitCallError::Open { retry_after }) => { /* degraded notice */ }
///     Err(CircuitCallError::Inner(e)) => { /* provider failed */ }
///     Ok(health) => { /* ... */ }
/// }
/// ```
pub trait CircuitBreaker: Send + Sync {
    /// Name of the protected dependency, for logs and metrics.
    fn name(&self) -> &str;

    /// Get the current state of the circuit.
    ///
    /// An open circuit whose timeout has elapsed still reports `Open`
    /// until the next call attempt moves it.
    fn state(&self) -> CircuitState;

    /// Ask to run one call.
    ///
    /// While open and the reset timeout is unexpired this rejects without
    /// side effects on the dependency. Once expired, the first caller
    /// moves the circuit to half-open and is allowed through.
    fn try_acquire(&self) -> Admission;

    /// Record a successful request.
    ///
    /// In half-open state, this counts toward the success threshold.
    /// In closed state, this resets the failure streak.
    fn record_success(&self);

    /// Record a failed request.
    ///
    /// In closed state, this counts toward the failure threshold.
    /// In half-open state, this immediately reopens the circuit.
    fn record_failure(&self);

    /// Force reset the circuit to closed state.
    ///
    /// Use sparingly - typically for administrative intervention.
    fn reset(&self);

    /// Get metrics about the circuit breaker.
    fn metrics(&self) -> CircuitBreakerMetrics;
}

/// Metrics about circuit breaker behavior.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerMetrics {
    /// Protected dependency
    pub name: String,

    /// Current state
    pub state: Option<CircuitState>,

    /// Total successful requests since creation
    pub total_successes: u64,

    /// Total failed requests since creation
    pub total_failures: u64,

    /// Calls rejected without reaching the dependency
    pub total_rejections: u64,

    /// Times the circuit has opened
    pub times_opened: u64,

    /// Current failure count
    pub current_failures: u32,

    /// Current success count (in half-open state)
    pub current_successes: u32,

    /// Time until circuit allows a probe (when open)
    #[serde(with = "optional_millis")]
    pub time_until_half_open: Option<Duration>,
}

/// Outcome of a call made through [`execute`].
#[derive(Debug, Error)]
pub enum CircuitCallError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("Circuit open, retry after {}s", retry_after.as_secs())]
    Open { retry_after: Duration },

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

/// Runs `operation` through `breaker`.
///
/// `trips_breaker` decides which errors say something about the health of
/// the dependency. Errors it rejects (bad input, missing resource) are
/// returned to the caller and recorded as a response from a live
/// dependency.
pub async fn execute<T, E, F, Fut>(
    breaker: &dyn CircuitBreaker,
    trips_breaker: impl Fn(&E) -> bool,
    operation: F,
) -> Result<T, CircuitCallError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Admission::Rejected { retry_after } = breaker.try_acquire() {
        return Err(CircuitCallError::Open { retry_after });
    }

    match operation().await {
        Ok(value) => {
            breaker.record_success();
            Ok(value)
        }
        Err(err) => {
            if trips_breaker(&err) {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
            Err(CircuitCallError::Inner(err))
        }
    }
}

mod optional_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }
}
