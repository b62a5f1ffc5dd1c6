//! Bodies for live-stream and webhook endpoints.

use serde::Serialize;

/// Outcome of a processed webhook delivery.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    /// Room members the resulting event was queued for; absent when the
    /// event type is not relayed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
}
