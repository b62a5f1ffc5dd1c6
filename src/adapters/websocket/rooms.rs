//! Room broadcaster: per-stream member sets and event fan-out.
//!
//! Rooms are keyed by stream id and partitioned into shards by a hash of
//! that id, so joins, leaves, and broadcasts for one room always serialize
//! on the same shard lock while unrelated rooms proceed independently.
//!
//! # Architecture
//!
//! ```text
//! shard 0                 shard 1
//! ├── Room: s1            └── Room: s2
//! │   ├── conn-a (viewer)     └── conn-d (streamer)
//! │   └── conn-b (viewer)
//! └── Room: s7
//!     └── conn-c (viewer)
//! ```
//!
//! Delivery pushes into each member's bounded outbound queue without
//! awaiting, under the shard lock. That gives FIFO per room; nothing is
//! promised across rooms.
//!
//! A member whose queue is full can no longer be given every event, so it
//! is reported back in the result as overflowed. The caller must drop
//! that connection once the shard lock is released.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::foundation::{ConnectionId, StreamId};
use crate::domain::relay::{JoinStreamSuccess, Role, Room, ServerEvent};
use crate::ports::Outbox;

type Shard = HashMap<StreamId, Room<Outbox>>;

/// Result of delivering one event to a room.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    /// Members whose outbound queue was full.
    pub overflowed: Vec<ConnectionId>,
}

/// Result of a join or leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub viewer_count: usize,
    /// Members whose queue was full when the count update went out.
    pub overflowed: Vec<ConnectionId>,
}

/// Manages stream rooms and fans events out to their members.
pub struct RoomBroadcaster {
    shards: Vec<Mutex<Shard>>,
}

impl RoomBroadcaster {
    /// Create a broadcaster with `shard_count` independent room partitions.
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, room_id: &StreamId) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        room_id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Join a connection to a room, creating the room if needed.
    ///
    /// The joiner receives `join-stream-success` first; then every member,
    /// joiner included, receives the updated `viewer-count-update`.
    pub async fn join(
        &self,
        room_id: &StreamId,
        connection_id: ConnectionId,
        role: Role,
        outbox: Outbox,
    ) -> Membership {
        let mut shard = self.shard(room_id).lock().await;
        let room = shard.entry(room_id.clone()).or_insert_with(|| {
            info!(room_id = %room_id, "Room created");
            Room::new(room_id.clone())
        });

        let viewer_count = room.insert(connection_id, role, outbox.clone());
        let ack = ServerEvent::JoinStreamSuccess(JoinStreamSuccess {
            stream_id: room_id.clone(),
            connection_id,
            viewer_count,
        });
        let mut result = FanOut::default();
        deliver(room_id, connection_id, &outbox, ack, &mut result);
        fan_out_into(
            room,
            ServerEvent::viewer_count(room_id.clone(), viewer_count),
            None,
            &mut result,
        );

        debug!(room_id = %room_id, connection_id = %connection_id, viewer_count, "Joined room");
        Membership {
            viewer_count,
            overflowed: result.overflowed,
        }
    }

    /// Remove a connection from a room.
    ///
    /// Remaining members receive a `viewer-count-update`. An emptied room
    /// is destroyed immediately. Returns `None` if the connection was not
    /// a member.
    pub async fn leave(&self, room_id: &StreamId, connection_id: &ConnectionId) -> Option<Membership> {
        let mut shard = self.shard(room_id).lock().await;
        let room = shard.get_mut(room_id)?;
        room.remove(connection_id)?;

        let viewer_count = room.viewer_count();
        let mut overflowed = Vec::new();
        if room.is_empty() {
            shard.remove(room_id);
            info!(room_id = %room_id, "Room destroyed");
        } else {
            overflowed = fan_out(room, ServerEvent::viewer_count(room_id.clone(), viewer_count), None)
                .overflowed;
        }

        debug!(room_id = %room_id, connection_id = %connection_id, viewer_count, "Left room");
        Some(Membership {
            viewer_count,
            overflowed,
        })
    }

    /// Deliver `event` to every member of the room except `exclude`.
    ///
    /// Closed queues are skipped; full ones are reported in
    /// [`FanOut::overflowed`]. A missing room is a no-op.
    pub async fn broadcast(
        &self,
        room_id: &StreamId,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> FanOut {
        let shard = self.shard(room_id).lock().await;
        match shard.get(room_id) {
            Some(room) => fan_out(room, event, exclude),
            None => FanOut::default(),
        }
    }

    /// Viewer count of a room, `None` if the room does not exist.
    pub async fn viewer_count(&self, room_id: &StreamId) -> Option<usize> {
        self.shard(room_id)
            .lock()
            .await
            .get(room_id)
            .map(|room| room.viewer_count())
    }

    /// Get all active room IDs (for monitoring/debugging).
    pub async fn active_rooms(&self) -> Vec<StreamId> {
        let mut rooms = Vec::new();
        for shard in &self.shards {
            rooms.extend(shard.lock().await.keys().cloned());
        }
        rooms
    }

    pub async fn room_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            count += shard.lock().await.len();
        }
        count
    }

    pub async fn total_viewers(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard
                .lock()
                .await
                .values()
                .map(|room| room.viewer_count())
                .sum::<usize>();
        }
        total
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new(16)
    }
}

fn fan_out(room: &Room<Outbox>, event: ServerEvent, exclude: Option<ConnectionId>) -> FanOut {
    let mut result = FanOut::default();
    fan_out_into(room, event, exclude, &mut result);
    result
}

fn fan_out_into(
    room: &Room<Outbox>,
    event: ServerEvent,
    exclude: Option<ConnectionId>,
    result: &mut FanOut,
) {
    for (id, member) in room.members() {
        if Some(*id) == exclude {
            continue;
        }
        deliver(room.id(), *id, &member.handle, event.clone(), result);
    }
}

fn deliver(
    room_id: &StreamId,
    connection_id: ConnectionId,
    outbox: &Outbox,
    event: ServerEvent,
    result: &mut FanOut,
) {
    match outbox.try_send(event) {
        Ok(()) => result.delivered += 1,
        Err(TrySendError::Full(event)) => {
            warn!(
                room_id = %room_id,
                connection_id = %connection_id,
                event = event.name(),
                "Outbound queue full, member will be evicted"
            );
            if !result.overflowed.contains(&connection_id) {
                result.overflowed.push(connection_id);
            }
        }
        Err(TrySendError::Closed(_)) => {
            debug!(connection_id = %connection_id, "Outbound queue closed, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::relay::{OverlayUpdate, ViewerCountUpdate};
    use tokio::sync::mpsc;

    fn room(id: &str) -> StreamId {
        StreamId::new(id).unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn overlay(stream: &StreamId) -> ServerEvent {
        ServerEvent::OverlayUpdate(OverlayUpdate {
            stream_id: stream.clone(),
            overlay_type: "poll".into(),
            overlay_data: serde_json::json!({"question": "?"}),
            timestamp: 1,
        })
    }

    #[tokio::test]
    async fn join_acks_then_announces_count() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        let (tx, mut rx) = mpsc::channel(8);
        let id = ConnectionId::new();

        assert_eq!(rooms.join(&s1, id, Role::Viewer, tx).await.viewer_count, 1);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ServerEvent::JoinStreamSuccess(ack) if ack.viewer_count == 1 && ack.connection_id == id
        ));
        assert_eq!(events[1], ServerEvent::viewer_count(s1, 1));
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        rooms.join(&s1, a, Role::Viewer, a_tx).await;
        rooms.join(&s1, b, Role::Viewer, b_tx).await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        assert_eq!(rooms.broadcast(&s1, overlay(&s1), Some(a)).await.delivered, 1);
        assert_eq!(drain(&mut b_rx), vec![overlay(&s1)]);
        assert!(drain(&mut a_rx).is_empty());
    }

    #[tokio::test]
    async fn streamers_are_members_but_not_viewers() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        rooms.join(&s1, ConnectionId::new(), Role::Streamer, mpsc::channel(8).0).await;
        let count = rooms
            .join(&s1, ConnectionId::new(), Role::Viewer, mpsc::channel(8).0)
            .await
            .viewer_count;
        assert_eq!(count, 1);
        assert_eq!(rooms.total_viewers().await, 1);
    }

    #[tokio::test]
    async fn last_leave_destroys_room_and_rejoin_starts_fresh() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        let id = ConnectionId::new();

        rooms.join(&s1, id, Role::Viewer, mpsc::channel(8).0).await;
        assert_eq!(rooms.leave(&s1, &id).await.map(|m| m.viewer_count), Some(0));
        assert_eq!(rooms.room_count().await, 0);
        assert_eq!(rooms.viewer_count(&s1).await, None);

        let count = rooms
            .join(&s1, ConnectionId::new(), Role::Viewer, mpsc::channel(8).0)
            .await
            .viewer_count;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn leave_announces_to_remaining_members() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        rooms.join(&s1, a, Role::Viewer, a_tx).await;
        rooms.join(&s1, b, Role::Viewer, mpsc::channel(8).0).await;
        drain(&mut a_rx);

        assert_eq!(rooms.leave(&s1, &b).await.map(|m| m.viewer_count), Some(1));
        assert_eq!(
            drain(&mut a_rx),
            vec![ServerEvent::ViewerCountUpdate(ViewerCountUpdate {
                stream_id: s1.clone(),
                count: 1
            })]
        );
    }

    #[tokio::test]
    async fn leave_by_non_member_is_noop() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        rooms.join(&s1, ConnectionId::new(), Role::Viewer, mpsc::channel(8).0).await;

        assert_eq!(rooms.leave(&s1, &ConnectionId::new()).await, None);
        assert_eq!(rooms.leave(&room("nope"), &ConnectionId::new()).await, None);
        assert_eq!(rooms.viewer_count(&s1).await, Some(1));
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let rooms = RoomBroadcaster::new(1);
        let s1 = room("s1");
        let s2 = room("s2");
        let (tx, mut rx) = mpsc::channel(8);

        rooms.join(&s2, ConnectionId::new(), Role::Viewer, tx).await;
        drain(&mut rx);

        rooms.broadcast(&s1, overlay(&s1), None).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(rooms.active_rooms().await, vec![s2]);
    }

    #[tokio::test]
    async fn full_queue_is_reported_without_blocking_others() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        let slow = ConnectionId::new();
        let (slow_tx, _slow_rx) = mpsc::channel(2);
        let (fast_tx, mut fast_rx) = mpsc::channel(16);

        rooms.join(&s1, slow, Role::Viewer, slow_tx).await;
        // slow queue now holds its ack and count update
        let joined = rooms.join(&s1, ConnectionId::new(), Role::Viewer, fast_tx).await;
        assert_eq!(joined.overflowed, vec![slow]);
        drain(&mut fast_rx);

        let result = rooms.broadcast(&s1, overlay(&s1), None).await;
        assert_eq!(result.delivered, 1);
        assert_eq!(result.overflowed, vec![slow]);
        assert_eq!(drain(&mut fast_rx).len(), 1);
    }

    #[tokio::test]
    async fn closed_queue_is_skipped_not_reported() {
        let rooms = RoomBroadcaster::new(4);
        let s1 = room("s1");
        let (gone_tx, gone_rx) = mpsc::channel(8);
        rooms.join(&s1, ConnectionId::new(), Role::Viewer, gone_tx).await;
        drop(gone_rx);

        let result = rooms.broadcast(&s1, overlay(&s1), None).await;
        assert_eq!(result, FanOut::default());
    }

    #[tokio::test]
    async fn broadcast_to_missing_room_is_noop() {
        let rooms = RoomBroadcaster::default();
        let result = rooms.broadcast(&room("ghost"), overlay(&room("ghost")), None).await;
        assert_eq!(result, FanOut::default());
    }
}
