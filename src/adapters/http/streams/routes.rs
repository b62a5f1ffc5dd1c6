//! Axum routers for live-stream and webhook endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::state::AppState;

use super::handlers::{
    create_stream, delete_stream, disable_stream, enable_stream, get_stream, handle_video_webhook,
    stream_metrics, video_health,
};

/// Routes mounted at `/api/streams`.
pub fn stream_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_stream))
        .route("/:id", get(get_stream).delete(delete_stream))
        .route("/:id/enable", post(enable_stream))
        .route("/:id/disable", post(disable_stream))
        .route("/:id/metrics", get(stream_metrics))
}

/// Routes mounted at `/api/video`.
pub fn video_routes() -> Router<AppState> {
    Router::new().route("/health", get(video_health))
}

/// Routes mounted at `/api/webhooks`.
///
/// No user authentication; deliveries are verified by signature.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/video", post(handle_video_webhook))
}
