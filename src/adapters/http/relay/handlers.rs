//! HTTP handlers for relay status and administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::domain::foundation::{ConnectionId, ValidationError};

use super::dto::{ConnectionResponse, DisconnectRequest, HealthResponse, StatsResponse};

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /api/relay/stats
pub async fn relay_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        relay: state.relay.stats().await,
        scaling: *state.scaling.borrow(),
        breakers: vec![state.video.breaker().metrics()],
    })
}

/// GET /api/relay/connections
pub async fn list_connections(State(state): State<AppState>) -> Json<Vec<ConnectionResponse>> {
    let connections = state.relay.connections().await;
    Json(connections.into_iter().map(ConnectionResponse::from).collect())
}

/// POST /api/relay/connections/:id/disconnect - Server-forced disconnect
pub async fn force_disconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<DisconnectRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let connection_id: ConnectionId = id
        .parse()
        .map_err(|_| ValidationError::invalid_format("connection_id", "not a UUID"))?;
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or_else(|| "disconnected by server".to_string());

    if state.relay.force_disconnect(&connection_id, &reason).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Connection", id))
    }
}
