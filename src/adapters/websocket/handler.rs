//! WebSocket upgrade handler for relay clients.
//!
//! Connection lifecycle:
//! 1. Admit against current capacity (rejection: `error` event, close 1013)
//! 2. Writer task drains the connection's outbound queue
//! 3. Reader loop dispatches text frames through the relay
//! 4. Either side ending tears down registry entry and room membership

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::application::relay::RelayService;
use crate::domain::relay::{RelayError, Role, ServerEvent};

use super::messages::{self, ConnectParams, CLOSE_TRY_AGAIN_LATER};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub relay: Arc<RelayService>,
}

impl WebSocketState {
    pub fn new(relay: Arc<RelayService>) -> Self {
        Self { relay }
    }
}

/// Route: `GET /ws?role=viewer|streamer`
///
/// Authentication happens upstream of the relay.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<WebSocketState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.role, state.relay))
}

async fn handle_socket(socket: WebSocket, role: Role, relay: Arc<RelayService>) {
    let (mut sender, mut receiver) = socket.split();

    let admitted = match relay.connect(role).await {
        Ok(admitted) => admitted,
        Err(e) => {
            debug!(error = %e, "Rejecting WebSocket client");
            if let Ok(frame) = messages::encode(&ServerEvent::error(e.code(), e.to_string())) {
                let _ = sender.send(frame).await;
            }
            let _ = sender
                .send(messages::close_frame(CLOSE_TRY_AGAIN_LATER, "capacity exceeded"))
                .await;
            return;
        }
    };
    let id = admitted.connection.id;
    let mut outbound = admitted.outbound;

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let close = messages::close_after(&event);
            match messages::encode(&event) {
                Ok(frame) => {
                    if let Err(e) = sender.send(frame).await {
                        debug!(connection_id = %id, "Send error, closing connection: {}", e);
                        return;
                    }
                }
                Err(e) => warn!(connection_id = %id, error = %e, "Could not encode event"),
            }
            if let Some(frame) = close {
                let _ = sender.send(frame).await;
                return;
            }
        }
        // Queue closed: the relay dropped this connection (sweep).
        let _ = sender
            .send(messages::close_frame(messages::CLOSE_NORMAL, "connection closed"))
            .await;
    });

    let reader_relay = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if let Err(RelayError::UnknownConnection(_)) =
                        reader_relay.dispatch_text(&id, &text).await
                    {
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    warn!(connection_id = %id, "Received unsupported binary message");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    reader_relay.touch(&id).await;
                }
                Ok(Message::Close(_)) => {
                    debug!(connection_id = %id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(connection_id = %id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.disconnect(&id).await;
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::registry::InMemoryConnectionRegistry;
    use crate::adapters::websocket::RoomBroadcaster;
    use crate::application::relay::RelayServiceConfig;
    use crate::domain::scaling::ScalingState;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn state() -> WebSocketState {
        let (_tx, rx) = watch::channel(ScalingState {
            active_connections: 0,
            max_connections: 10,
            compression_level: 6,
            auto_scaling_enabled: false,
        });
        WebSocketState::new(Arc::new(RelayService::new(
            Arc::new(InMemoryConnectionRegistry::new(rx)),
            Arc::new(RoomBroadcaster::default()),
            RelayServiceConfig::default(),
        )))
    }

    #[tokio::test]
    async fn plain_http_request_is_not_upgraded() {
        let app = websocket_router().with_state(state());
        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn no_connection_is_admitted_without_upgrade() {
        let state = state();
        let app = websocket_router().with_state(state.clone());
        let _ = app
            .oneshot(
                Request::builder()
                    .uri("/ws?role=streamer")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(state.relay.stats().await.active_connections, 0);
    }
}
