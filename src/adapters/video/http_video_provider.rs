//! HTTP video provider adapter.
//!
//! Implements the `VideoProvider` trait against a Mux-style REST control
//! API (`/video/v1/live-streams`, responses wrapped in `{"data": ...}`).
//!
//! # Security
//!
//! - Access token pair sent as HTTP basic auth
//! - Token secret held in `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = HttpVideoConfig::new(token_id, token_secret).with_base_url(url);
//! let provider = HttpVideoProvider::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::relay::StreamStatus;
use crate::ports::{
    CreateLiveStreamRequest, LatencyMode, LiveStream, PlaybackPolicy, ProviderHealth,
    StreamMetrics, VideoProvider, VideoProviderError,
};

/// Video provider API configuration.
#[derive(Clone)]
pub struct HttpVideoConfig {
    token_id: String,
    token_secret: SecretString,

    /// Base URL of the control API (default: https://api.mux.com).
    base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl HttpVideoConfig {
    pub fn new(token_id: impl Into<String>, token_secret: SecretString) -> Self {
        Self {
            token_id: token_id.into(),
            token_secret,
            base_url: "https://api.mux.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Video provider adapter over HTTP.
pub struct HttpVideoProvider {
    config: HttpVideoConfig,
    http_client: reqwest::Client,
}

impl HttpVideoProvider {
    pub fn new(config: HttpVideoConfig) -> Result<Self, VideoProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VideoProviderError::network(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, self.url(path))
            .basic_auth(
                &self.config.token_id,
                Some(self.config.token_secret.expose_secret()),
            )
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<reqwest::Response, VideoProviderError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = map_status(status, resource, body);
        if error.is_transient() {
            tracing::warn!(status = status.as_u16(), error = %error, "Video provider request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %error, "Video provider rejected request");
        }
        Err(error)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, VideoProviderError> {
        let envelope: DataEnvelope<T> = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Unexpected video provider response");
            VideoProviderError::Parse(e.to_string())
        })?;
        Ok(envelope.data)
    }
}

fn map_transport_error(error: reqwest::Error) -> VideoProviderError {
    if error.is_timeout() {
        VideoProviderError::Timeout
    } else {
        VideoProviderError::network(error.to_string())
    }
}

fn map_status(status: StatusCode, resource: &str, body: String) -> VideoProviderError {
    match status {
        StatusCode::NOT_FOUND => VideoProviderError::NotFound(resource.to_string()),
        StatusCode::TOO_MANY_REQUESTS => VideoProviderError::RateLimited,
        _ => VideoProviderError::api(status.as_u16(), body),
    }
}

#[async_trait]
impl VideoProvider for HttpVideoProvider {
    async fn create_live_stream(
        &self,
        request: CreateLiveStreamRequest,
    ) -> Result<LiveStream, VideoProviderError> {
        let body = ApiCreateLiveStream::from(&request);
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/video/v1/live-streams")
                    .json(&body),
                "live-streams",
            )
            .await?;

        let stream: ApiLiveStream = Self::parse(response).await?;
        tracing::info!(live_stream_id = %stream.id, "Live stream created");
        Ok(stream.into())
    }

    async fn get_live_stream(&self, id: &str) -> Result<Option<LiveStream>, VideoProviderError> {
        let path = format!("/video/v1/live-streams/{}", id);
        match self.send(self.request(reqwest::Method::GET, &path), id).await {
            Ok(response) => {
                let stream: ApiLiveStream = Self::parse(response).await?;
                Ok(Some(stream.into()))
            }
            Err(VideoProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_live_stream(&self, id: &str) -> Result<(), VideoProviderError> {
        let path = format!("/video/v1/live-streams/{}", id);
        self.send(self.request(reqwest::Method::DELETE, &path), id)
            .await?;
        tracing::info!(live_stream_id = %id, "Live stream deleted");
        Ok(())
    }

    async fn set_live_stream_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<(), VideoProviderError> {
        let action = if enabled { "enable" } else { "disable" };
        let path = format!("/video/v1/live-streams/{}/{}", id, action);
        self.send(self.request(reqwest::Method::PUT, &path), id)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<ProviderHealth, VideoProviderError> {
        let started = Instant::now();
        self.send(
            self.request(reqwest::Method::GET, "/video/v1/live-streams")
                .query(&[("limit", "1")]),
            "live-streams",
        )
        .await?;
        Ok(ProviderHealth {
            healthy: true,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn stream_metrics(&self, id: &str) -> Result<StreamMetrics, VideoProviderError> {
        let path = format!("/data/v1/live-streams/{}/metrics", id);
        let response = self
            .send(self.request(reqwest::Method::GET, &path), id)
            .await?;
        let metrics: ApiStreamMetrics = Self::parse(response).await?;
        Ok(StreamMetrics {
            stream_id: id.to_string(),
            current_viewers: metrics.current_viewers,
            total_views: metrics.total_views,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire Types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiCreateLiveStream {
    playback_policy: Vec<PlaybackPolicy>,
    latency_mode: LatencyMode,
    reconnect_window: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    passthrough: Option<String>,
    new_asset_settings: ApiAssetSettings,
}

#[derive(Debug, Serialize)]
struct ApiAssetSettings {
    playback_policy: Vec<PlaybackPolicy>,
}

impl From<&CreateLiveStreamRequest> for ApiCreateLiveStream {
    fn from(request: &CreateLiveStreamRequest) -> Self {
        Self {
            playback_policy: vec![request.playback_policy],
            latency_mode: request.latency_mode,
            reconnect_window: request.reconnect_window_secs,
            passthrough: request.passthrough.clone(),
            new_asset_settings: ApiAssetSettings {
                playback_policy: vec![request.playback_policy],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiLiveStream {
    id: String,
    status: StreamStatus,
    #[serde(default)]
    stream_key: Option<String>,
    #[serde(default)]
    playback_ids: Vec<ApiPlaybackId>,
    #[serde(default)]
    passthrough: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaybackId {
    id: String,
}

impl From<ApiLiveStream> for LiveStream {
    fn from(api: ApiLiveStream) -> Self {
        Self {
            id: api.id,
            status: api.status,
            stream_key: api.stream_key,
            playback_ids: api.playback_ids.into_iter().map(|p| p.id).collect(),
            passthrough: api.passthrough,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiStreamMetrics {
    #[serde(default)]
    current_viewers: u64,
    #[serde(default)]
    total_views: u64,
}
