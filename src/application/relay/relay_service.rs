//! RelayService - message-passing core of the relay.
//!
//! Each connection owns a bounded outbound queue. Inbound events are
//! parsed by the transport, routed by [`route_client_message`], and
//! executed here against the registry and the room broadcaster.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::adapters::websocket::RoomBroadcaster;
use crate::domain::foundation::{ConnectionId, StreamId, UserId, ValidationError};
use crate::domain::relay::{
    ClientEvent, Connection, ForceDisconnect, RelayError, Role, ServerEvent,
};
use crate::ports::ConnectionRegistry;

use super::route_message::{route_client_message, RelayCommand, RouteLimits};

/// Tunables for the relay core.
#[derive(Debug, Clone)]
pub struct RelayServiceConfig {
    /// Idle time after which a connection is swept. Default: 30s
    pub stale_after: Duration,
    /// Per-connection outbound queue capacity. Default: 256
    pub outbound_queue_capacity: usize,
    pub limits: RouteLimits,
}

impl Default for RelayServiceConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            outbound_queue_capacity: 256,
            limits: RouteLimits::default(),
        }
    }
}

/// An admitted connection and the receiving end of its outbound queue.
///
/// The queue closes once the relay has dropped the connection (close,
/// forced disconnect, or sweep), which is the transport's cue to hang up.
#[derive(Debug)]
pub struct Admitted {
    pub connection: Connection,
    pub outbound: mpsc::Receiver<ServerEvent>,
}

/// Point-in-time relay counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    pub active_connections: usize,
    pub max_connections: usize,
    pub rooms: usize,
    pub viewers: usize,
}

/// Relay core shared by every transport.
pub struct RelayService {
    registry: Arc<dyn ConnectionRegistry>,
    rooms: Arc<RoomBroadcaster>,
    config: RelayServiceConfig,
}

impl RelayService {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        rooms: Arc<RoomBroadcaster>,
        config: RelayServiceConfig,
    ) -> Self {
        Self {
            registry,
            rooms,
            config,
        }
    }

    pub fn config(&self) -> &RelayServiceConfig {
        &self.config
    }

    /// Handshake: admit a new connection.
    pub async fn connect(&self, role: Role) -> Result<Admitted, RelayError> {
        let (tx, outbound) = mpsc::channel(self.config.outbound_queue_capacity.max(1));
        let connection = self.registry.admit(ConnectionId::new(), role, tx).await?;
        info!(connection_id = %connection.id, role = %role, "Client connected");
        Ok(Admitted {
            connection,
            outbound,
        })
    }

    /// Record inbound activity that carries no event (e.g. a transport ping).
    pub async fn touch(&self, id: &ConnectionId) -> bool {
        self.registry.touch(id).await
    }

    /// Parse and dispatch one raw JSON frame.
    ///
    /// Malformed frames produce an `error` event and change nothing.
    pub async fn dispatch_text(&self, id: &ConnectionId, text: &str) -> Result<(), RelayError> {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.dispatch(id, event).await,
            Err(e) => {
                self.registry.touch(id).await;
                let err = RelayError::from(ValidationError::invalid_format("message", e.to_string()));
                self.report(id, &err).await;
                Err(err)
            }
        }
    }

    /// Dispatch one event, reporting any failure to the sender as `error`.
    pub async fn dispatch(&self, id: &ConnectionId, event: ClientEvent) -> Result<(), RelayError> {
        let name = event.name();
        let result = self.handle_message(id, event).await;
        if let Err(e) = &result {
            debug!(connection_id = %id, event = name, error = %e, "Client event rejected");
            self.report(id, e).await;
        }
        result
    }

    async fn report(&self, id: &ConnectionId, err: &RelayError) {
        self.send_to(id, ServerEvent::error(err.code(), err.to_string())).await;
    }

    /// Execute one event from a connection.
    pub async fn handle_message(&self, id: &ConnectionId, event: ClientEvent) -> Result<(), RelayError> {
        if !self.registry.touch(id).await {
            return Err(RelayError::UnknownConnection(*id));
        }
        let sender = self
            .registry
            .get(id)
            .await
            .ok_or(RelayError::UnknownConnection(*id))?;

        let command = route_client_message(
            &sender,
            event,
            &self.config.limits,
            chrono::Utc::now().timestamp_millis(),
        )?;

        match command {
            RelayCommand::Join {
                stream_id,
                role,
                user_id,
            } => self.join(&sender, stream_id, role, user_id).await,
            RelayCommand::Leave { stream_id } => self.leave(&sender, &stream_id).await,
            RelayCommand::Broadcast { stream_id, event } => {
                let fan_out = self.rooms.broadcast(&stream_id, event, Some(*id)).await;
                debug!(
                    connection_id = %id,
                    room_id = %stream_id,
                    delivered = fan_out.delivered,
                    "Broadcast"
                );
                self.evict(fan_out.overflowed).await;
                Ok(())
            }
            RelayCommand::Reply(event) => {
                self.send_to(id, event).await;
                Ok(())
            }
        }
    }

    async fn join(
        &self,
        sender: &Connection,
        stream_id: StreamId,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<(), RelayError> {
        let id = sender.id;
        let outbox = self
            .registry
            .outbox(&id)
            .await
            .ok_or(RelayError::UnknownConnection(id))?;

        let previous = self
            .registry
            .assign_room(&id, Some(stream_id.clone()), role, user_id)
            .await?;
        let mut overflowed = Vec::new();
        if let Some(previous) = previous {
            if let Some(left) = self.rooms.leave(&previous, &id).await {
                overflowed.extend(left.overflowed);
            }
        }

        let joined = self.rooms.join(&stream_id, id, role, outbox).await;
        overflowed.extend(joined.overflowed);

        // A concurrent disconnect may have run between assign and join.
        if self.registry.get(&id).await.is_none() {
            if let Some(left) = self.rooms.leave(&stream_id, &id).await {
                overflowed.extend(left.overflowed);
            }
            self.evict(overflowed).await;
            return Err(RelayError::UnknownConnection(id));
        }

        info!(
            connection_id = %id,
            room_id = %stream_id,
            viewer_count = joined.viewer_count,
            "Joined stream"
        );
        self.evict(overflowed).await;
        Ok(())
    }

    async fn leave(&self, sender: &Connection, stream_id: &StreamId) -> Result<(), RelayError> {
        if sender.room_id.as_ref() != Some(stream_id) {
            debug!(connection_id = %sender.id, room_id = %stream_id, "Leave for room not held");
            return Ok(());
        }
        // Fails only if the connection vanished; the room then keeps nothing to leave.
        self.registry
            .assign_room(&sender.id, None, sender.role, None)
            .await?;
        if let Some(left) = self.rooms.leave(stream_id, &sender.id).await {
            self.evict(left.overflowed).await;
        }
        Ok(())
    }

    /// Drop a connection and its room membership. Idempotent.
    pub async fn disconnect(&self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.registry.remove(id).await?;
        let overflowed = self.release(&connection).await;
        info!(connection_id = %id, "Client disconnected");
        self.evict(overflowed).await;
        Some(connection)
    }

    /// Server-initiated disconnect; clients must not retry automatically.
    pub async fn force_disconnect(&self, id: &ConnectionId, reason: &str) -> bool {
        if let Some(outbox) = self.registry.outbox(id).await {
            // The connection is dropped whether or not the notice fits.
            let _ = outbox.try_send(ServerEvent::ForceDisconnect(ForceDisconnect {
                reason: reason.to_string(),
            }));
        }
        match self.registry.remove(id).await {
            Some(connection) => {
                let overflowed = self.release(&connection).await;
                warn!(connection_id = %id, reason, "Client force-disconnected");
                self.evict(overflowed).await;
                true
            }
            None => false,
        }
    }

    /// Remove connections idle beyond the staleness threshold.
    pub async fn sweep_stale(&self) -> usize {
        let swept = self.registry.sweep_stale(self.config.stale_after).await;
        let mut overflowed = Vec::new();
        for connection in &swept {
            overflowed.extend(self.release(connection).await);
            info!(connection_id = %connection.id, "Stale connection swept");
        }
        self.evict(overflowed).await;
        swept.len()
    }

    /// Fan an event out to a whole room (server-originated).
    ///
    /// Returns how many members were handed the event.
    pub async fn publish_to_room(&self, stream_id: &StreamId, event: ServerEvent) -> usize {
        let fan_out = self.rooms.broadcast(stream_id, event, None).await;
        self.evict(fan_out.overflowed).await;
        fan_out.delivered
    }

    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            active_connections: self.registry.active_count().await,
            max_connections: self.registry.max_connections(),
            rooms: self.rooms.room_count().await,
            viewers: self.rooms.total_viewers().await,
        }
    }

    pub async fn connections(&self) -> Vec<Connection> {
        self.registry.list().await
    }

    pub async fn active_connections(&self) -> usize {
        self.registry.active_count().await
    }

    /// Leave the connection's room, returning members that overflowed on
    /// the resulting viewer-count update.
    async fn release(&self, connection: &Connection) -> Vec<ConnectionId> {
        match &connection.room_id {
            Some(room) => self
                .rooms
                .leave(room, &connection.id)
                .await
                .map(|left| left.overflowed)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Drop consumers whose outbound queue overflowed.
    ///
    /// Dropping the registry entry and the room membership closes the
    /// queue, so the transport hangs up and the client reconnects.
    /// Each eviction can overflow further members; those are drained
    /// from the same worklist.
    async fn evict(&self, mut pending: Vec<ConnectionId>) {
        while let Some(id) = pending.pop() {
            if let Some(connection) = self.registry.remove(&id).await {
                warn!(connection_id = %id, "Slow consumer evicted");
                pending.extend(self.release(&connection).await);
            }
        }
    }

    async fn send_to(&self, id: &ConnectionId, event: ServerEvent) {
        let Some(outbox) = self.registry.outbox(id).await else {
            return;
        };
        match outbox.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %id, "Outbound queue full, evicting");
                self.evict(vec![*id]).await;
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %id, "Direct event for closed queue");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::registry::InMemoryConnectionRegistry;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::relay::{JoinStream, LeaveStream, SendChatMessage};
    use crate::domain::scaling::ScalingState;
    use tokio::sync::watch;

    fn service(max: usize) -> (watch::Sender<ScalingState>, RelayService) {
        service_with_queue(max, RelayServiceConfig::default().outbound_queue_capacity)
    }

    fn service_with_queue(
        max: usize,
        outbound_queue_capacity: usize,
    ) -> (watch::Sender<ScalingState>, RelayService) {
        let (tx, rx) = watch::channel(ScalingState {
            active_connections: 0,
            max_connections: max,
            compression_level: 6,
            auto_scaling_enabled: true,
        });
        let registry = Arc::new(InMemoryConnectionRegistry::new(rx));
        let service = RelayService::new(
            registry,
            Arc::new(RoomBroadcaster::new(4)),
            RelayServiceConfig {
                outbound_queue_capacity,
                ..RelayServiceConfig::default()
            },
        );
        (tx, service)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn join(stream: &str) -> ClientEvent {
        ClientEvent::JoinStream(JoinStream {
            stream_id: StreamId::new(stream).unwrap(),
            user_type: Role::Viewer,
            user_id: None,
        })
    }

    fn chat(stream: &str, message: &str) -> ClientEvent {
        ClientEvent::SendChatMessage(SendChatMessage {
            stream_id: StreamId::new(stream).unwrap(),
            message: message.into(),
            username: "host".into(),
            timestamp: None,
        })
    }

    #[tokio::test]
    async fn connect_rejects_when_full() {
        let (_tx, service) = service(1);
        let _first = service.connect(Role::Viewer).await.unwrap();
        let err = service.connect(Role::Viewer).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AdmissionRejected);
    }

    #[tokio::test]
    async fn joining_second_room_leaves_first() {
        let (_tx, service) = service(10);
        let mut a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;

        service.handle_message(&id, join("s1")).await.unwrap();
        service.handle_message(&id, join("s2")).await.unwrap();
        drain(&mut a.outbound);

        let stats = service.stats().await;
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.viewers, 1);
    }

    #[tokio::test]
    async fn invalid_event_reports_error_and_keeps_state() {
        let (_tx, service) = service(10);
        let mut a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;
        service.handle_message(&id, join("s1")).await.unwrap();
        drain(&mut a.outbound);

        let result = service
            .dispatch(
                &id,
                ClientEvent::SendChatMessage(SendChatMessage {
                    stream_id: StreamId::new("s1").unwrap(),
                    message: "x".repeat(501),
                    username: "a".into(),
                    timestamp: None,
                }),
            )
            .await;
        assert!(result.is_err());

        let events = drain(&mut a.outbound);
        assert!(matches!(
            &events[..],
            [ServerEvent::Error(payload)] if payload.code == "VALIDATION_FAILED"
        ));
        assert_eq!(service.stats().await.viewers, 1);
    }

    #[tokio::test]
    async fn malformed_json_yields_error_event() {
        let (_tx, service) = service(10);
        let mut a = service.connect(Role::Viewer).await.unwrap();

        let result = service.dispatch_text(&a.connection.id, "{not json").await;
        assert_eq!(result.unwrap_err().code(), ErrorCode::ValidationFailed);
        assert!(matches!(
            drain(&mut a.outbound).as_slice(),
            [ServerEvent::Error(_)]
        ));
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let (_tx, service) = service(10);
        let mut a = service.connect(Role::Viewer).await.unwrap();

        service
            .dispatch_text(&a.connection.id, r#"{"event":"ping"}"#)
            .await
            .unwrap();
        assert!(matches!(
            drain(&mut a.outbound).as_slice(),
            [ServerEvent::Pong(_)]
        ));
    }

    #[tokio::test]
    async fn disconnect_cleans_up_room_and_closes_queue() {
        let (_tx, service) = service(10);
        let mut a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;
        service.handle_message(&id, join("s1")).await.unwrap();

        assert!(service.disconnect(&id).await.is_some());
        assert!(service.disconnect(&id).await.is_none());
        assert_eq!(service.stats().await.rooms, 0);

        drain(&mut a.outbound);
        assert!(a.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn leave_for_unheld_room_is_noop() {
        let (_tx, service) = service(10);
        let a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;
        service.handle_message(&id, join("s1")).await.unwrap();

        service
            .handle_message(
                &id,
                ClientEvent::LeaveStream(LeaveStream {
                    stream_id: StreamId::new("s9").unwrap(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(service.stats().await.viewers, 1);
    }

    #[tokio::test]
    async fn leave_clears_registry_room_and_membership() {
        let (_tx, service) = service(10);
        let a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;
        service.handle_message(&id, join("s1")).await.unwrap();

        service
            .handle_message(
                &id,
                ClientEvent::LeaveStream(LeaveStream {
                    stream_id: StreamId::new("s1").unwrap(),
                }),
            )
            .await
            .unwrap();

        let connections = service.connections().await;
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].room_id, None);
        assert_eq!(service.stats().await.rooms, 0);
    }

    #[tokio::test]
    async fn force_disconnect_notifies_then_drops() {
        let (_tx, service) = service(10);
        let mut a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;

        assert!(service.force_disconnect(&id, "banned").await);
        assert_eq!(
            a.outbound.recv().await,
            Some(ServerEvent::ForceDisconnect(ForceDisconnect {
                reason: "banned".into()
            }))
        );
        assert!(a.outbound.recv().await.is_none());
        assert!(!service.force_disconnect(&id, "again").await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_silent_connections() {
        let (_tx, service) = service(10);
        let quiet = service.connect(Role::Viewer).await.unwrap();
        let chatty = service.connect(Role::Viewer).await.unwrap();
        service.handle_message(&quiet.connection.id, join("s1")).await.unwrap();

        tokio::time::advance(Duration::from_secs(25)).await;
        service.touch(&chatty.connection.id).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(service.sweep_stale().await, 1);
        let stats = service.stats().await;
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.rooms, 0);
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted_when_its_queue_fills() {
        let (_tx, service) = service_with_queue(10, 4);
        let mut fast = service.connect(Role::Viewer).await.unwrap();
        let mut slow = service.connect(Role::Viewer).await.unwrap();
        let fast_id = fast.connection.id;
        let slow_id = slow.connection.id;
        service.handle_message(&fast_id, join("s1")).await.unwrap();
        service.handle_message(&slow_id, join("s1")).await.unwrap();

        for i in 0..10 {
            drain(&mut fast.outbound);
            service
                .handle_message(&fast_id, chat("s1", &format!("msg {i}")))
                .await
                .unwrap();
        }

        let stats = service.stats().await;
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.viewers, 1);
        assert!(service.connections().await.iter().all(|c| c.id != slow_id));

        // Whatever was queued before eviction drains, then the queue closes.
        let backlog = drain(&mut slow.outbound);
        assert!(backlog.len() <= 4);
        assert!(slow.outbound.recv().await.is_none());

        let err = service.handle_message(&slow_id, chat("s1", "late")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn full_queue_on_direct_reply_evicts_sender() {
        let (_tx, service) = service_with_queue(10, 1);
        let mut a = service.connect(Role::Viewer).await.unwrap();
        let id = a.connection.id;

        service.dispatch(&id, ClientEvent::Ping).await.unwrap();
        service.dispatch(&id, ClientEvent::Ping).await.unwrap();

        assert_eq!(service.active_connections().await, 0);
        assert!(matches!(a.outbound.recv().await, Some(ServerEvent::Pong(_))));
        assert!(a.outbound.recv().await.is_none());
    }
}
