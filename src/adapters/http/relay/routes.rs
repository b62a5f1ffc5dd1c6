//! Axum router for relay endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::adapters::http::state::AppState;

use super::handlers::{force_disconnect, list_connections, relay_stats};

/// Routes mounted at `/api/relay`.
///
/// - `GET /stats` - registry, rooms, scaling state, breaker metrics
/// - `GET /connections` - admitted connections
/// - `POST /connections/:id/disconnect` - forced disconnect
pub fn relay_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(relay_stats))
        .route("/connections", get(list_connections))
        .route("/connections/:id/disconnect", post(force_disconnect))
}
