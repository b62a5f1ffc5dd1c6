//! Resilience adapters - breaker implementation, retry, and the resilient
//! video client built from them.

mod circuit_breaker;
mod resilient_video;
mod retry;

pub use circuit_breaker::InMemoryCircuitBreaker;
pub use resilient_video::{ExternalError, ResilientVideoProvider};
pub use retry::{with_retry, RetryConfig};
