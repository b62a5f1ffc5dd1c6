//! HTTP adapter for live streams at the video provider and its webhooks.

mod dto;
mod handlers;
mod routes;

pub use dto::WebhookAck;
pub use routes::{stream_routes, video_routes, webhook_routes};
