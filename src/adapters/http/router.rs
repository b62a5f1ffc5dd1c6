//! Full HTTP application: REST routes, the WebSocket endpoint, CORS, and
//! request tracing.

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::adapters::websocket::{websocket_router, WebSocketState};

use super::relay::{health, relay_routes};
use super::state::AppState;
use super::streams::{stream_routes, video_routes, webhook_routes};

/// Builds the application router.
///
/// An empty `cors_origins` list allows any origin.
pub fn app_router(state: AppState, cors_origins: &[String]) -> Router {
    let ws_state = WebSocketState::new(state.relay.clone());

    Router::new()
        .route("/health", get(health))
        .nest("/api/relay", relay_routes())
        .nest("/api/streams", stream_routes())
        .nest("/api/video", video_routes())
        .nest("/api/webhooks", webhook_routes())
        .with_state(state)
        .merge(websocket_router().with_state(ws_state))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
