//! ConnectionRegistry port - Interface for live relay connection tracking.
//!
//! The registry exclusively owns every [`Connection`]: it admits new ones
//! against the current capacity, records room membership and liveness, and
//! hands back removed connections so the caller can clean up rooms.
//!
//! ## Lifecycle
//!
//! 1. Handshake → `admit` (rejected once `active >= max`)
//! 2. Every inbound frame → `touch`
//! 3. Join/leave → `assign_room`
//! 4. Close, forced disconnect, or staleness → `remove` / `sweep_stale`

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::foundation::{ConnectionId, StreamId, UserId};
use crate::domain::relay::{Connection, RelayError, Role, ServerEvent};

/// Outbound event queue of one connection.
pub type Outbox = mpsc::Sender<ServerEvent>;

/// Port for tracking live connections in this process.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Admit a new connection if capacity allows.
    ///
    /// The capacity check and the insert are atomic with respect to other
    /// admissions.
    async fn admit(
        &self,
        id: ConnectionId,
        role: Role,
        outbox: Outbox,
    ) -> Result<Connection, RelayError>;

    /// Remove a connection. Idempotent: unknown ids return `None`.
    async fn remove(&self, id: &ConnectionId) -> Option<Connection>;

    /// Refresh liveness. Returns false for unknown ids.
    async fn touch(&self, id: &ConnectionId) -> bool;

    /// Current view of a connection.
    async fn get(&self, id: &ConnectionId) -> Option<Connection>;

    /// Outbound queue of a connection, for direct (non-room) delivery.
    async fn outbox(&self, id: &ConnectionId) -> Option<Outbox>;

    /// Record the connection's room (or `None` after a leave).
    ///
    /// Returns the room previously held.
    async fn assign_room(
        &self,
        id: &ConnectionId,
        room: Option<StreamId>,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<Option<StreamId>, RelayError>;

    /// Snapshot of every admitted connection, in no particular order.
    async fn list(&self) -> Vec<Connection>;

    /// Number of admitted connections.
    async fn active_count(&self) -> usize;

    /// Admission ceiling currently in force.
    fn max_connections(&self) -> usize;

    /// Remove and return every connection idle for longer than `threshold`.
    async fn sweep_stale(&self, threshold: Duration) -> Vec<Connection>;
}
