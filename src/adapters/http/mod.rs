//! HTTP adapters - REST API and WebSocket mounting.
//!
//! - [`relay`] - health, stats, connection administration
//! - [`streams`] - live streams at the video provider, provider webhooks
//! - [`error`] - error bodies and status mapping shared by all routes

pub mod error;
pub mod relay;
mod router;
mod state;
pub mod streams;

pub use error::{ApiError, ErrorResponse};
pub use router::app_router;
pub use state::AppState;
