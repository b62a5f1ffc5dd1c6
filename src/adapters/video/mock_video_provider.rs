//! Mock video provider for testing.
//!
//! Provides a configurable in-memory implementation of `VideoProvider`
//! for unit and integration tests. Supports:
//! - Stream storage (create/get/delete/toggle behave consistently)
//! - Error injection per method, for a number of calls or permanently
//! - Call tracking

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::relay::StreamStatus;
use crate::ports::{
    CreateLiveStreamRequest, LiveStream, ProviderHealth, StreamMetrics, VideoProvider,
    VideoProviderError,
};

/// Mock video provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockVideoProvider::new();
///
/// // Fail the next two health checks, then recover
/// mock.fail_next("health_check", VideoProviderError::Timeout, 2);
///
/// let result = mock.health_check().await;
/// assert_eq!(mock.calls("health_check"), 1);
/// ```
#[derive(Default, Clone)]
pub struct MockVideoProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    streams: HashMap<String, LiveStream>,
    viewers: HashMap<String, u64>,
    next_id: u64,

    /// Errors queued per method, consumed one per call.
    queued_errors: HashMap<&'static str, VecDeque<VideoProviderError>>,

    /// Errors returned on every call to a method until cleared.
    sticky_errors: HashMap<&'static str, VideoProviderError>,

    call_log: Vec<&'static str>,
}

impl MockVideoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Fail the next `times` calls of `method` with `error`.
    pub fn fail_next(&self, method: &'static str, error: VideoProviderError, times: usize) {
        let mut state = self.lock();
        let queue = state.queued_errors.entry(method).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Fail every call of `method` until [`clear_errors`](Self::clear_errors).
    pub fn fail_always(&self, method: &'static str, error: VideoProviderError) {
        self.lock().sticky_errors.insert(method, error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.lock();
        state.queued_errors.clear();
        state.sticky_errors.clear();
    }

    /// Insert a stream as if it had been created earlier.
    pub fn insert_stream(&self, stream: LiveStream) {
        self.lock().streams.insert(stream.id.clone(), stream);
    }

    pub fn set_viewers(&self, id: &str, viewers: u64) {
        self.lock().viewers.insert(id.to_string(), viewers);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    /// Number of calls made to `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.lock().call_log.iter().filter(|m| **m == method).count()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().call_log.len()
    }

    /// Record the call and return an injected error, if any.
    fn enter(&self, method: &'static str) -> Result<MutexGuard<'_, MockState>, VideoProviderError> {
        let mut state = self.lock();
        state.call_log.push(method);
        if let Some(error) = state.sticky_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.queued_errors.get_mut(method).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl VideoProvider for MockVideoProvider {
    async fn create_live_stream(
        &self,
        request: CreateLiveStreamRequest,
    ) -> Result<LiveStream, VideoProviderError> {
        let mut state = self.enter("create_live_stream")?;
        state.next_id += 1;
        let id = format!("ls_mock_{}", state.next_id);
        let stream = LiveStream {
            id: id.clone(),
            status: StreamStatus::Idle,
            stream_key: Some(format!("sk_{}", id)),
            playback_ids: vec![format!("pb_{}", id)],
            passthrough: request.passthrough,
        };
        state.streams.insert(id, stream.clone());
        Ok(stream)
    }

    async fn get_live_stream(&self, id: &str) -> Result<Option<LiveStream>, VideoProviderError> {
        let state = self.enter("get_live_stream")?;
        Ok(state.streams.get(id).cloned())
    }

    async fn delete_live_stream(&self, id: &str) -> Result<(), VideoProviderError> {
        let mut state = self.enter("delete_live_stream")?;
        state
            .streams
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| VideoProviderError::NotFound(id.to_string()))
    }

    async fn set_live_stream_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<(), VideoProviderError> {
        let mut state = self.enter("set_live_stream_enabled")?;
        let stream = state
            .streams
            .get_mut(id)
            .ok_or_else(|| VideoProviderError::NotFound(id.to_string()))?;
        stream.status = if enabled {
            StreamStatus::Idle
        } else {
            StreamStatus::Disabled
        };
        Ok(())
    }

    async fn health_check(&self) -> Result<ProviderHealth, VideoProviderError> {
        self.enter("health_check")?;
        Ok(ProviderHealth {
            healthy: true,
            latency_ms: 1,
        })
    }

    async fn stream_metrics(&self, id: &str) -> Result<StreamMetrics, VideoProviderError> {
        let state = self.enter("stream_metrics")?;
        if !state.streams.contains_key(id) {
            return Err(VideoProviderError::NotFound(id.to_string()));
        }
        let viewers = state.viewers.get(id).copied().unwrap_or(0);
        Ok(StreamMetrics {
            stream_id: id.to_string(),
            current_viewers: viewers,
            total_views: viewers,
        })
    }
}
