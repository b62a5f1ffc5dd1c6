//! Response and request bodies for relay endpoints.

use serde::{Deserialize, Serialize};

use crate::application::relay::RelayStats;
use crate::domain::foundation::{ConnectionId, StreamId, Timestamp, UserId};
use crate::domain::relay::{Connection, Role};
use crate::domain::scaling::ScalingState;
use crate::ports::CircuitBreakerMetrics;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub relay: RelayStats,
    pub scaling: ScalingState,
    pub breakers: Vec<CircuitBreakerMetrics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub id: ConnectionId,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<StreamId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub joined_at: Timestamp,
}

impl From<Connection> for ConnectionResponse {
    fn from(c: Connection) -> Self {
        Self {
            id: c.id,
            role: c.role,
            room_id: c.room_id,
            user_id: c.user_id,
            joined_at: c.joined_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DisconnectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}
