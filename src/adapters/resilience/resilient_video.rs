//! Resilient video client.
//!
//! Every call to the video provider goes through the endpoint's circuit
//! breaker. Idempotent reads (get, health, metrics) are additionally
//! retried with backoff; mutating calls (create, delete, toggle) run
//! exactly once, since repeating a create can duplicate remote resources.
//!
//! The breaker wraps the whole retry sequence, so one logical call is one
//! breaker outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::domain::foundation::ErrorCode;
use crate::ports::{
    execute, CircuitBreaker, CircuitCallError, CreateLiveStreamRequest, LiveStream,
    ProviderHealth, StreamMetrics, VideoProvider, VideoProviderError,
};

use super::retry::{with_retry, RetryConfig, RetryExhausted};

/// External-dependency failures as surfaced to the application layer.
#[derive(Debug, Error)]
pub enum ExternalError {
    /// Dependency presumed unhealthy; the call was not attempted.
    #[error("Video provider unavailable, retry after {}s", retry_after.as_secs())]
    CircuitOpen { retry_after: Duration },

    /// The call failed after every permitted attempt.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    CallFailed {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: VideoProviderError,
    },
}

impl ExternalError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExternalError::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            ExternalError::CallFailed {
                source: VideoProviderError::NotFound(_),
                ..
            } => ErrorCode::NotFound,
            ExternalError::CallFailed { .. } => ErrorCode::ExternalCallFailed,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ExternalError::CircuitOpen { retry_after } => Some(*retry_after),
            ExternalError::CallFailed { .. } => None,
        }
    }
}

/// Video provider behind a circuit breaker and read retries.
#[derive(Clone)]
pub struct ResilientVideoProvider {
    inner: Arc<dyn VideoProvider>,
    breaker: Arc<dyn CircuitBreaker>,
    retry: RetryConfig,
}

impl ResilientVideoProvider {
    pub fn new(
        inner: Arc<dyn VideoProvider>,
        breaker: Arc<dyn CircuitBreaker>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            inner,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &Arc<dyn CircuitBreaker> {
        &self.breaker
    }

    pub async fn create_live_stream(
        &self,
        request: CreateLiveStreamRequest,
    ) -> Result<LiveStream, ExternalError> {
        self.mutate("create_live_stream", || self.inner.create_live_stream(request))
            .await
    }

    pub async fn get_live_stream(&self, id: &str) -> Result<Option<LiveStream>, ExternalError> {
        self.read("get_live_stream", || self.inner.get_live_stream(id))
            .await
    }

    pub async fn delete_live_stream(&self, id: &str) -> Result<(), ExternalError> {
        self.mutate("delete_live_stream", || self.inner.delete_live_stream(id))
            .await
    }

    pub async fn set_live_stream_enabled(&self, id: &str, enabled: bool) -> Result<(), ExternalError> {
        self.mutate("set_live_stream_enabled", || {
            self.inner.set_live_stream_enabled(id, enabled)
        })
        .await
    }

    pub async fn health_check(&self) -> Result<ProviderHealth, ExternalError> {
        self.read("health_check", || self.inner.health_check()).await
    }

    pub async fn stream_metrics(&self, id: &str) -> Result<StreamMetrics, ExternalError> {
        self.read("stream_metrics", || self.inner.stream_metrics(id))
            .await
    }

    async fn read<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, ExternalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VideoProviderError>>,
    {
        let retry = &self.retry;
        let outcome = execute(
            self.breaker.as_ref(),
            |e: &RetryExhausted<VideoProviderError>| e.last_error.is_transient(),
            || with_retry(retry, VideoProviderError::is_transient, f),
        )
        .await;
        self.normalize(operation, outcome)
    }

    async fn mutate<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, ExternalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, VideoProviderError>>,
    {
        let outcome = execute(
            self.breaker.as_ref(),
            |e: &RetryExhausted<VideoProviderError>| e.last_error.is_transient(),
            || async move {
                f().await.map_err(|last_error| RetryExhausted {
                    attempts: 1,
                    last_error,
                })
            },
        )
        .await;
        self.normalize(operation, outcome)
    }

    fn normalize<T>(
        &self,
        operation: &'static str,
        outcome: Result<T, CircuitCallError<RetryExhausted<VideoProviderError>>>,
    ) -> Result<T, ExternalError> {
        outcome.map_err(|e| match e {
            CircuitCallError::Open { retry_after } => {
                warn!(
                    breaker = %self.breaker.name(),
                    operation,
                    retry_after_secs = retry_after.as_secs(),
                    "Video provider call rejected, circuit open"
                );
                ExternalError::CircuitOpen { retry_after }
            }
            CircuitCallError::Inner(RetryExhausted {
                attempts,
                last_error,
            }) => ExternalError::CallFailed {
                operation,
                attempts,
                source: last_error,
            },
        })
    }
}
