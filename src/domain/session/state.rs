//! Client session state and the transitions that drive it.

use std::time::Duration;

use serde::Serialize;

use crate::domain::foundation::{StateMachine, StreamId, ValidationError};
use crate::domain::relay::Role;

use super::{ReconnectPolicy, SessionStatus};

/// Read-only view of a session for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<StreamId>,
}

impl SessionSnapshot {
    /// Attempt progress such as `"3/5"`.
    pub fn progress_label(&self) -> String {
        format!("{}/{}", self.attempt, self.max_attempts)
    }
}

/// Mutable session state owned by one client controller.
///
/// The room is remembered across drops so a successful reconnect can
/// re-issue the join without the caller noticing.
#[derive(Debug, Clone)]
pub struct SessionState {
    status: SessionStatus,
    attempt: u32,
    last_error: Option<String>,
    room: Option<StreamId>,
    role: Role,
}

impl SessionState {
    pub fn new(role: Role) -> Self {
        Self {
            status: SessionStatus::Connecting,
            attempt: 0,
            last_error: None,
            room: None,
            role,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn room(&self) -> Option<&StreamId> {
        self.room.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Remembers the room to rejoin after a reconnect.
    pub fn remember_room(&mut self, room: StreamId, role: Role) {
        self.room = Some(room);
        self.role = role;
    }

    /// Forgets the held room; returns it if there was one.
    pub fn forget_room(&mut self) -> Option<StreamId> {
        self.room.take()
    }

    /// Handshake succeeded. Resets the attempt counter and error.
    pub fn on_connected(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(SessionStatus::Connected)?;
        self.attempt = 0;
        self.last_error = None;
        Ok(())
    }

    /// The transport closed or a handshake failed.
    ///
    /// A forced close (server-initiated) lands in `Failed`; anything else
    /// lands in `Disconnected` from where reconnects start.
    pub fn on_closed(&mut self, forced: bool, reason: impl Into<String>) -> Result<(), ValidationError> {
        let target = if forced {
            SessionStatus::Failed
        } else {
            SessionStatus::Disconnected
        };
        self.status = self.status.transition_to(target)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Starts the next automatic attempt.
    ///
    /// Returns the delay to wait before the handshake, or `None` when the
    /// ceiling has been reached and the session moved to `Failed`.
    pub fn begin_attempt(&mut self, policy: &ReconnectPolicy) -> Result<Option<Duration>, ValidationError> {
        if policy.is_exhausted(self.attempt) {
            self.status = self.status.transition_to(SessionStatus::Failed)?;
            return Ok(None);
        }
        if self.status != SessionStatus::Reconnecting {
            self.status = self.status.transition_to(SessionStatus::Reconnecting)?;
        }
        self.attempt += 1;
        Ok(Some(policy.delay_for(self.attempt)))
    }

    /// Records a failed reconnect attempt without leaving `Reconnecting`.
    pub fn on_attempt_failed(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
    }

    /// Manual retry from `Failed` (or `Disconnected`).
    pub fn restart(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(SessionStatus::Connecting)?;
        self.attempt = 0;
        Ok(())
    }

    pub fn snapshot(&self, policy: &ReconnectPolicy) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            attempt: self.attempt,
            max_attempts: policy.max_attempts,
            last_error: self.last_error.clone(),
            room: self.room.clone(),
        }
    }
}
