//! Video provider adapters.
//!
//! - `HttpVideoProvider` - REST control API client
//! - `MockVideoProvider` - configurable in-memory double
//! - `WebhookVerifier` - signature checks for provider webhooks

mod http_video_provider;
mod mock_video_provider;
mod webhook;

pub use http_video_provider::{HttpVideoConfig, HttpVideoProvider};
pub use mock_video_provider::MockVideoProvider;
pub use webhook::{
    SignatureHeader, VideoWebhookEvent, WebhookError, WebhookObject, WebhookVerifier,
    SIGNATURE_HEADER,
};
