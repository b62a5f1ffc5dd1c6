//! In-memory connection registry for a single relay process.
//!
//! Admission reads the ceiling published by the capacity monitor through a
//! `watch` channel; the registry never writes scaling state itself.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::foundation::{ConnectionId, StreamId, UserId};
use crate::domain::relay::{Connection, RelayError, Role};
use crate::domain::scaling::ScalingState;
use crate::ports::{ConnectionRegistry, Outbox};

struct Entry {
    connection: Connection,
    outbox: Outbox,
}

/// Registry of live connections keyed by connection id.
pub struct InMemoryConnectionRegistry {
    entries: RwLock<HashMap<ConnectionId, Entry>>,
    scaling: watch::Receiver<ScalingState>,
}

impl InMemoryConnectionRegistry {
    pub fn new(scaling: watch::Receiver<ScalingState>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            scaling,
        }
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn admit(
        &self,
        id: ConnectionId,
        role: Role,
        outbox: Outbox,
    ) -> Result<Connection, RelayError> {
        let max = self.max_connections();
        let mut entries = self.entries.write().await;

        if entries.len() >= max {
            info!(
                connection_id = %id,
                active = entries.len(),
                max,
                "Admission rejected, capacity exceeded"
            );
            return Err(RelayError::AdmissionRejected {
                active: entries.len(),
                max,
            });
        }

        let connection = Connection::new(id, role);
        entries.insert(
            id,
            Entry {
                connection: connection.clone(),
                outbox,
            },
        );
        debug!(connection_id = %id, role = %role, active = entries.len(), "Connection admitted");
        Ok(connection)
    }

    async fn remove(&self, id: &ConnectionId) -> Option<Connection> {
        let removed = self.entries.write().await.remove(id)?;
        debug!(connection_id = %id, "Connection removed");
        Some(removed.connection)
    }

    async fn touch(&self, id: &ConnectionId) -> bool {
        match self.entries.write().await.get_mut(id) {
            Some(entry) => {
                entry.connection.touch(Instant::now());
                true
            }
            None => false,
        }
    }

    async fn get(&self, id: &ConnectionId) -> Option<Connection> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.connection.clone())
    }

    async fn outbox(&self, id: &ConnectionId) -> Option<Outbox> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.outbox.clone())
    }

    async fn assign_room(
        &self,
        id: &ConnectionId,
        room: Option<StreamId>,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<Option<StreamId>, RelayError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or(RelayError::UnknownConnection(*id))?;

        let connection = &mut entry.connection;
        connection.role = role;
        if user_id.is_some() {
            connection.user_id = user_id;
        }
        Ok(std::mem::replace(&mut connection.room_id, room))
    }

    async fn list(&self) -> Vec<Connection> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.connection.clone())
            .collect()
    }

    async fn active_count(&self) -> usize {
        self.entries.read().await.len()
    }

    fn max_connections(&self) -> usize {
        self.scaling.borrow().max_connections
    }

    async fn sweep_stale(&self, threshold: Duration) -> Vec<Connection> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let stale: Vec<ConnectionId> = entries
            .iter()
            .filter(|(_, entry)| entry.connection.is_stale(now, threshold))
            .map(|(id, _)| *id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| entries.remove(&id))
            .map(|entry| entry.connection)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn scaling(max: usize) -> (watch::Sender<ScalingState>, InMemoryConnectionRegistry) {
        let (tx, rx) = watch::channel(ScalingState {
            active_connections: 0,
            max_connections: max,
            compression_level: 6,
            auto_scaling_enabled: true,
        });
        (tx, InMemoryConnectionRegistry::new(rx))
    }

    fn outbox() -> Outbox {
        mpsc::channel(8).0
    }

    #[tokio::test]
    async fn rejects_exactly_at_capacity() {
        let (_tx, registry) = scaling(2);
        let a = ConnectionId::new();

        registry.admit(a, Role::Viewer, outbox()).await.unwrap();
        registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.unwrap();

        let err = registry
            .admit(ConnectionId::new(), Role::Viewer, outbox())
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::AdmissionRejected { active: 2, max: 2 });

        registry.remove(&a).await;
        assert!(registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.is_ok());
    }

    #[tokio::test]
    async fn admission_follows_published_ceiling() {
        let (tx, registry) = scaling(1);
        registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.unwrap();
        assert!(registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.is_err());

        tx.send_modify(|state| state.max_connections = 2);
        assert!(registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.is_ok());
    }

    #[tokio::test]
    async fn lowered_ceiling_does_not_evict() {
        let (tx, registry) = scaling(3);
        for _ in 0..3 {
            registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.unwrap();
        }
        tx.send_modify(|state| state.max_connections = 1);

        assert_eq!(registry.active_count().await, 3);
        assert!(registry.admit(ConnectionId::new(), Role::Viewer, outbox()).await.is_err());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (_tx, registry) = scaling(10);
        let id = ConnectionId::new();
        registry.admit(id, Role::Streamer, outbox()).await.unwrap();

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.remove(&id).await.is_none());
        assert!(!registry.touch(&id).await);
    }

    #[tokio::test]
    async fn assign_room_returns_previous() {
        let (_tx, registry) = scaling(10);
        let id = ConnectionId::new();
        registry.admit(id, Role::Viewer, outbox()).await.unwrap();
        let s1 = StreamId::new("s1").unwrap();
        let s2 = StreamId::new("s2").unwrap();

        assert_eq!(registry.assign_room(&id, Some(s1.clone()), Role::Viewer, None).await, Ok(None));
        assert_eq!(
            registry.assign_room(&id, Some(s2.clone()), Role::Streamer, None).await,
            Ok(Some(s1))
        );
        let connection = registry.get(&id).await.unwrap();
        assert_eq!(connection.room_id, Some(s2));
        assert_eq!(connection.role, Role::Streamer);
    }

    #[tokio::test]
    async fn assign_room_for_unknown_connection_fails() {
        let (_tx, registry) = scaling(10);
        let id = ConnectionId::new();
        assert_eq!(
            registry.assign_room(&id, None, Role::Viewer, None).await,
            Err(RelayError::UnknownConnection(id))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_idle_connections() {
        let (_tx, registry) = scaling(10);
        let idle = ConnectionId::new();
        let active = ConnectionId::new();
        registry.admit(idle, Role::Viewer, outbox()).await.unwrap();
        registry.admit(active, Role::Viewer, outbox()).await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        registry.touch(&active).await;
        tokio::time::advance(Duration::from_secs(11)).await;

        let swept = registry.sweep_stale(Duration::from_secs(30)).await;
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, idle);
        assert_eq!(registry.active_count().await, 1);
    }
}
