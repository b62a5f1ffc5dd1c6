//! Room aggregate: the member set of one live stream.
//!
//! A room is created lazily on first join and must be discarded by its
//! owner the moment `is_empty()` becomes true. The viewer count is kept
//! incrementally and always equals the number of viewer-role members.

use std::collections::HashMap;

use crate::domain::foundation::{ConnectionId, StreamId};

use super::Role;

/// A member of a room together with its delivery handle.
///
/// The handle type is left generic so the domain does not depend on the
/// channel implementation used for fan-out.
#[derive(Debug, Clone)]
pub struct RoomMember<H> {
    pub role: Role,
    pub handle: H,
}

/// Member set of one stream.
#[derive(Debug)]
pub struct Room<H> {
    id: StreamId,
    members: HashMap<ConnectionId, RoomMember<H>>,
    viewer_count: usize,
}

impl<H> Room<H> {
    /// Creates an empty room.
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            members: HashMap::new(),
            viewer_count: 0,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Adds (or re-adds with a new role) a member; returns the viewer count.
    pub fn insert(&mut self, connection_id: ConnectionId, role: Role, handle: H) -> usize {
        if let Some(previous) = self
            .members
            .insert(connection_id, RoomMember { role, handle })
        {
            if previous.role.is_viewer() {
                self.viewer_count -= 1;
            }
        }
        if role.is_viewer() {
            self.viewer_count += 1;
        }
        self.viewer_count
    }

    /// Removes a member if present.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<RoomMember<H>> {
        let removed = self.members.remove(connection_id)?;
        if removed.role.is_viewer() {
            self.viewer_count -= 1;
        }
        Some(removed)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains_key(connection_id)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewer_count
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates members in no particular order.
    pub fn members(&self) -> impl Iterator<Item = (&ConnectionId, &RoomMember<H>)> {
        self.members.iter()
    }
}
