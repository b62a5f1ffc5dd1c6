//! Shared state for the HTTP routes.

use std::sync::Arc;

use tokio::sync::watch;

use crate::adapters::resilience::ResilientVideoProvider;
use crate::adapters::video::WebhookVerifier;
use crate::application::relay::RelayService;
use crate::domain::scaling::ScalingState;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    pub video: Arc<ResilientVideoProvider>,
    pub scaling: watch::Receiver<ScalingState>,
    /// `None` disables the webhook endpoint.
    pub webhooks: Option<Arc<WebhookVerifier>>,
}
