//! Video provider port for the external video-hosting control API.
//!
//! Defines the contract for live-stream management at the hosting
//! provider. Implementations talk to the provider directly; callers in the
//! application layer only ever reach it through the resilient wrapper.
//!
//! # Design
//!
//! - **Raw failures**: errors are reported as they happened; normalising
//!   them into the relay taxonomy is the wrapper's job
//! - **Idempotency is the caller's concern**: `create_live_stream` is not
//!   safe to repeat

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::relay::StreamStatus;

/// Port for the video-hosting control API.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Create a live stream. Not idempotent.
    async fn create_live_stream(
        &self,
        request: CreateLiveStreamRequest,
    ) -> Result<LiveStream, VideoProviderError>;

    /// Get a live stream by provider id.
    async fn get_live_stream(&self, id: &str) -> Result<Option<LiveStream>, VideoProviderError>;

    /// Delete a live stream.
    async fn delete_live_stream(&self, id: &str) -> Result<(), VideoProviderError>;

    /// Enable or disable ingest for a live stream.
    async fn set_live_stream_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<(), VideoProviderError>;

    /// Cheap liveness query against the provider.
    async fn health_check(&self) -> Result<ProviderHealth, VideoProviderError>;

    /// Current delivery metrics of a live stream.
    async fn stream_metrics(&self, id: &str) -> Result<StreamMetrics, VideoProviderError>;
}

/// Request to create a live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLiveStreamRequest {
    #[serde(default = "default_playback_policy")]
    pub playback_policy: PlaybackPolicy,

    #[serde(default)]
    pub latency_mode: LatencyMode,

    /// Seconds the provider waits for the encoder to come back.
    #[serde(default = "default_reconnect_window")]
    pub reconnect_window_secs: u32,

    /// Free-form reference stored with the stream at the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passthrough: Option<String>,
}

fn default_playback_policy() -> PlaybackPolicy {
    PlaybackPolicy::Public
}

fn default_reconnect_window() -> u32 {
    60
}

impl Default for CreateLiveStreamRequest {
    fn default() -> Self {
        Self {
            playback_policy: default_playback_policy(),
            latency_mode: LatencyMode::default(),
            reconnect_window_secs: default_reconnect_window(),
            passthrough: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPolicy {
    Public,
    Signed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMode {
    #[default]
    Standard,
    Reduced,
    Low,
}

/// A live stream as known by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStream {
    pub id: String,
    pub status: StreamStatus,
    /// RTMP ingest key. Only the streamer should ever see it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_key: Option<String>,
    #[serde(default)]
    pub playback_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passthrough: Option<String>,
}

/// Provider liveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub healthy: bool,
    pub latency_ms: u64,
}

/// Delivery metrics for one live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetrics {
    pub stream_id: String,
    pub current_viewers: u64,
    #[serde(default)]
    pub total_views: u64,
}

/// Errors from video provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoProviderError {
    /// Connection refused, DNS failure, reset.
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// Provider throttled the request.
    #[error("Rate limited by video provider")]
    RateLimited,

    /// The resource does not exist.
    #[error("Live stream not found: {0}")]
    NotFound(String),

    /// Non-success response not covered above.
    #[error("Video provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

impl VideoProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// True for failures that say the dependency is unhealthy.
    ///
    /// These are retried (for reads) and counted by the circuit breaker.
    /// Client-side 4xx responses are neither.
    pub fn is_transient(&self) -> bool {
        match self {
            VideoProviderError::Network(_)
            | VideoProviderError::Timeout
            | VideoProviderError::RateLimited => true,
            VideoProviderError::Api { status, .. } => *status >= 500,
            VideoProviderError::NotFound(_) | VideoProviderError::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert!(VideoProviderError::api(503, "unavailable").is_transient());
        assert!(VideoProviderError::Timeout.is_transient());
        assert!(VideoProviderError::RateLimited.is_transient());
        assert!(VideoProviderError::network("reset").is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!VideoProviderError::api(400, "bad").is_transient());
        assert!(!VideoProviderError::NotFound("x".into()).is_transient());
        assert!(!VideoProviderError::Parse("eof".into()).is_transient());
    }

    #[test]
    fn create_request_defaults() {
        let request: CreateLiveStreamRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, CreateLiveStreamRequest::default());
        assert_eq!(request.reconnect_window_secs, 60);
        assert_eq!(request.playback_policy, PlaybackPolicy::Public);
    }
}
