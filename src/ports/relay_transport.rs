//! RelayTransport port - the client side of a relay connection.
//!
//! A [`ClientSessionController`](crate::application::ClientSessionController)
//! drives one of these. Implementations exist for the in-process relay;
//! a WebSocket client would implement the same trait.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::foundation::ErrorCode;
use crate::domain::relay::{ClientEvent, Role, ServerEvent};

/// Something that arrived on an open transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(ServerEvent),
    /// The server ended the session. `forced` means no automatic retry.
    Closed { forced: bool, reason: String },
}

/// An open transport: a sender half and an inbox.
pub struct TransportSession {
    pub link: Box<dyn TransportLink>,
    pub inbox: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Port for opening relay connections.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Perform the handshake.
    async fn open(&self, role: Role) -> Result<TransportSession, TransportError>;
}

/// Sending half of an open transport.
#[async_trait]
pub trait TransportLink: Send + Sync {
    async fn send(&self, event: ClientEvent) -> Result<(), TransportError>;

    /// Close from the client side. Idempotent.
    async fn close(&self);
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server refused admission; back off before retrying.
    #[error("Admission rejected: {0}")]
    Rejected(String),

    /// Handshake or I/O failure.
    #[error("Transport failure: {0}")]
    Io(String),

    /// The transport is already closed.
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::Rejected(_) => ErrorCode::AdmissionRejected,
            TransportError::Io(_) | TransportError::Closed => ErrorCode::TransportError,
        }
    }
}
