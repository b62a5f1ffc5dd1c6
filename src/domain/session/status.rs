//! SessionStatus enum for tracking a client's connection lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Connection status of one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    /// Needs end-user action; no automatic attempts are made from here.
    Failed,
}

impl SessionStatus {
    /// Returns true while a transport is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionStatus::Connected)
    }
}

impl StateMachine for SessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionStatus::*;
        matches!(
            (self, target),
            (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connecting, Failed)
                | (Connected, Disconnected)
                | (Connected, Failed)
                | (Disconnected, Reconnecting)
                | (Disconnected, Connecting)
                | (Disconnected, Failed)
                | (Reconnecting, Connected)
                | (Reconnecting, Failed)
                | (Failed, Connecting)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionStatus::*;
        match self {
            Connecting => vec![Connected, Disconnected, Failed],
            Connected => vec![Disconnected, Failed],
            Disconnected => vec![Reconnecting, Connecting, Failed],
            Reconnecting => vec![Connected, Failed],
            Failed => vec![Connecting],
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Reconnecting => "reconnecting",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
