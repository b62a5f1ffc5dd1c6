//! Relay configuration: admission bounds, liveness, and message limits

use std::time::Duration;

use serde::Deserialize;

use crate::application::relay::{RelayServiceConfig, RouteLimits};

use super::error::ValidationError;

/// Relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Admission ceiling at startup
    #[serde(default = "default_initial_max")]
    pub initial_max_connections: usize,

    /// Lowest ceiling scale-down may reach
    #[serde(default = "default_floor")]
    pub floor_max_connections: usize,

    /// Highest ceiling scale-up may reach
    #[serde(default = "default_ceiling")]
    pub ceiling_max_connections: usize,

    /// Idle seconds before a connection is swept
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Per-connection outbound queue capacity
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Number of room shards
    #[serde(default = "default_room_shards")]
    pub room_shards: usize,

    /// Maximum chat message length in characters
    #[serde(default = "default_max_chat_len")]
    pub max_chat_message_len: usize,
}

impl RelayConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn service_config(&self) -> RelayServiceConfig {
        RelayServiceConfig {
            stale_after: self.stale_after(),
            outbound_queue_capacity: self.outbound_queue_capacity,
            limits: RouteLimits {
                max_chat_message_len: self.max_chat_message_len,
                ..RouteLimits::default()
            },
        }
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.floor_max_connections == 0
            || self.floor_max_connections > self.initial_max_connections
            || self.initial_max_connections > self.ceiling_max_connections
        {
            return Err(ValidationError::InvalidConnectionBounds {
                floor: self.floor_max_connections,
                initial: self.initial_max_connections,
                ceiling: self.ceiling_max_connections,
            });
        }
        if self.stale_after_secs == 0 {
            return Err(ValidationError::MustBePositive("stale_after_secs"));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ValidationError::MustBePositive("outbound_queue_capacity"));
        }
        if self.room_shards == 0 {
            return Err(ValidationError::MustBePositive("room_shards"));
        }
        if self.max_chat_message_len == 0 {
            return Err(ValidationError::MustBePositive("max_chat_message_len"));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            initial_max_connections: default_initial_max(),
            floor_max_connections: default_floor(),
            ceiling_max_connections: default_ceiling(),
            stale_after_secs: default_stale_after(),
            outbound_queue_capacity: default_queue_capacity(),
            room_shards: default_room_shards(),
            max_chat_message_len: default_max_chat_len(),
        }
    }
}

fn default_initial_max() -> usize {
    1000
}

fn default_floor() -> usize {
    100
}

fn default_ceiling() -> usize {
    10_000
}

fn default_stale_after() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    256
}

fn default_room_shards() -> usize {
    16
}

fn default_max_chat_len() -> usize {
    500
}
