//! HTTP handlers for live streams at the video provider.
//!
//! Every provider call goes through the resilient client, so failures
//! arrive here already classified (circuit open, call failed, not found).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{debug, info};

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::adapters::video::{VideoWebhookEvent, WebhookError, SIGNATURE_HEADER};
use crate::domain::foundation::StreamId;
use crate::domain::relay::{ServerEvent, StreamStatusChanged};
use crate::ports::{CreateLiveStreamRequest, LiveStream, ProviderHealth, StreamMetrics};

use super::dto::WebhookAck;

/// POST /api/streams - Create a live stream (never retried)
pub async fn create_stream(
    State(state): State<AppState>,
    Json(request): Json<CreateLiveStreamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stream = state.video.create_live_stream(request).await?;
    info!(live_stream_id = %stream.id, "Live stream created");
    Ok((StatusCode::CREATED, Json(stream)))
}

/// GET /api/streams/:id
pub async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LiveStream>, ApiError> {
    state
        .video
        .get_live_stream(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Live stream", id))
}

/// DELETE /api/streams/:id
pub async fn delete_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.video.delete_live_stream(&id).await?;
    info!(live_stream_id = %id, "Live stream deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/streams/:id/enable
pub async fn enable_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.video.set_live_stream_enabled(&id, true).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/streams/:id/disable
pub async fn disable_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.video.set_live_stream_enabled(&id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/streams/:id/metrics
pub async fn stream_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamMetrics>, ApiError> {
    Ok(Json(state.video.stream_metrics(&id).await?))
}

/// GET /api/video/health
pub async fn video_health(State(state): State<AppState>) -> Result<Json<ProviderHealth>, ApiError> {
    Ok(Json(state.video.health_check().await?))
}

/// POST /api/webhooks/video - Provider lifecycle events
///
/// Live-stream status events fan out to the matching room as
/// `stream-status-changed`; other event types are acknowledged and dropped.
pub async fn handle_video_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let verifier = state.webhooks.as_ref().ok_or(ApiError::WebhooksDisabled)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader)?;
    verifier.verify(signature, &body)?;

    let event = VideoWebhookEvent::parse(&body)?;
    let Some(status) = event.stream_status() else {
        debug!(event_type = %event.event_type, "Ignoring video webhook");
        return Ok(Json(WebhookAck {
            received: true,
            delivered: None,
        }));
    };

    let stream_id = StreamId::new(event.room_key())?;
    let delivered = state
        .relay
        .publish_to_room(
            &stream_id,
            ServerEvent::StreamStatusChanged(StreamStatusChanged {
                stream_id: stream_id.clone(),
                status,
            }),
        )
        .await;
    info!(room_id = %stream_id, ?status, delivered, "Stream status changed");

    Ok(Json(WebhookAck {
        received: true,
        delivered: Some(delivered),
    }))
}
