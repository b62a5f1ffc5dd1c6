//! In-process transport: a client controller wired straight to a
//! [`RelayService`] without a socket in between.
//!
//! Used by embedded deployments and by the reconnect tests. A forced
//! disconnect becomes `Closed { forced: true }`; the outbound queue
//! closing for any other reason becomes `Closed { forced: false }`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::relay::RelayService;
use crate::domain::foundation::ConnectionId;
use crate::domain::relay::{ClientEvent, RelayError, Role, ServerEvent};
use crate::ports::{RelayTransport, TransportError, TransportEvent, TransportLink, TransportSession};

const INBOX_CAPACITY: usize = 64;

pub struct LocalRelayTransport {
    relay: Arc<RelayService>,
}

impl LocalRelayTransport {
    pub fn new(relay: Arc<RelayService>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl RelayTransport for LocalRelayTransport {
    async fn open(&self, role: Role) -> Result<TransportSession, TransportError> {
        let admitted = self.relay.connect(role).await.map_err(|e| match e {
            RelayError::AdmissionRejected { .. } => TransportError::Rejected(e.to_string()),
            other => TransportError::Io(other.to_string()),
        })?;
        let id = admitted.connection.id;
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);

        tokio::spawn(forward(self.relay.clone(), id, admitted.outbound, tx));

        Ok(TransportSession {
            link: Box::new(LocalLink {
                relay: self.relay.clone(),
                id,
                closed: AtomicBool::new(false),
            }),
            inbox,
        })
    }
}

/// Moves relay output into the client's inbox until either side goes away.
async fn forward(
    relay: Arc<RelayService>,
    id: ConnectionId,
    mut outbound: mpsc::Receiver<ServerEvent>,
    inbox: mpsc::Sender<TransportEvent>,
) {
    while let Some(event) = outbound.recv().await {
        if let ServerEvent::ForceDisconnect(f) = event {
            let _ = inbox
                .send(TransportEvent::Closed {
                    forced: true,
                    reason: f.reason,
                })
                .await;
            return;
        }
        if inbox.send(TransportEvent::Message(event)).await.is_err() {
            // Client side is gone without closing.
            relay.disconnect(&id).await;
            return;
        }
    }

    debug!(connection_id = %id, "Relay closed in-process connection");
    let _ = inbox
        .send(TransportEvent::Closed {
            forced: false,
            reason: "connection closed by relay".to_string(),
        })
        .await;
}

struct LocalLink {
    relay: Arc<RelayService>,
    id: ConnectionId,
    closed: AtomicBool,
}

#[async_trait]
impl TransportLink for LocalLink {
    async fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.relay.dispatch(&self.id, event).await {
            Err(RelayError::UnknownConnection(_)) => Err(TransportError::Closed),
            // Other failures were already reported to the client as `error`.
            _ => Ok(()),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.relay.disconnect(&self.id).await;
        }
    }
}
