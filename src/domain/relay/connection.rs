//! Connection entity owned by the connection registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::foundation::{ConnectionId, StreamId, Timestamp, UserId};

/// Role a connection plays inside a room.
///
/// Only viewers count toward a room's viewer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Streamer,
}

impl Role {
    pub fn is_viewer(&self) -> bool {
        matches!(self, Role::Viewer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Viewer => f.write_str("viewer"),
            Role::Streamer => f.write_str("streamer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::domain::foundation::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "streamer" => Ok(Role::Streamer),
            other => Err(crate::domain::foundation::ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// A live connection as tracked by the registry.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
    pub room_id: Option<StreamId>,
    pub user_id: Option<UserId>,
    /// Wall-clock admission time, for display.
    pub joined_at: Timestamp,
    /// Monotonic time of the last inbound frame.
    pub last_activity_at: Instant,
}

impl Connection {
    /// Creates a freshly admitted connection with no room.
    pub fn new(id: ConnectionId, role: Role) -> Self {
        Self {
            id,
            role,
            room_id: None,
            user_id: None,
            joined_at: Timestamp::now(),
            last_activity_at: Instant::now(),
        }
    }

    /// Records inbound activity.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity_at = now;
    }

    /// True once no activity has been seen for longer than `threshold`.
    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_activity_at) > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Viewer".parse::<Role>().unwrap(), Role::Viewer);
        assert_eq!("STREAMER".parse::<Role>().unwrap(), Role::Streamer);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Streamer).unwrap(), "\"streamer\"");
    }

    #[tokio::test(start_paused = true)]
    async fn connection_goes_stale_after_threshold() {
        let conn = Connection::new(ConnectionId::new(), Role::Viewer);
        let threshold = Duration::from_secs(30);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!conn.is_stale(Instant::now(), threshold));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(conn.is_stale(Instant::now(), threshold));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_resets_staleness() {
        let mut conn = Connection::new(ConnectionId::new(), Role::Viewer);
        let threshold = Duration::from_secs(30);

        tokio::time::advance(Duration::from_secs(29)).await;
        conn.touch(Instant::now());
        tokio::time::advance(Duration::from_secs(29)).await;

        assert!(!conn.is_stale(Instant::now(), threshold));
    }
}
