//! ClientSessionController - connect, join, reconnect, and surface status.
//!
//! The controller spawns one driver task that owns the [`SessionState`] and
//! the open transport. Callers talk to it through a command channel and
//! watch its [`SessionSnapshot`]; server events are forwarded on a separate
//! receiver. Transport failures never surface as errors on the handle:
//! they move the state machine and show up in the snapshot.
//!
//! While connected the driver pings the relay every
//! [`ReconnectPolicy::heartbeat_interval`] so a silent viewer is not swept
//! as stale. `pong` replies are consumed by the driver and never reach the
//! event receiver.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::foundation::{StreamId, UserId, ValidationError};
use crate::domain::relay::{ClientEvent, JoinStream, LeaveStream, Role, ServerEvent};
use crate::domain::session::{ReconnectPolicy, SessionSnapshot, SessionState, SessionStatus};
use crate::ports::{RelayTransport, TransportError, TransportEvent, TransportLink, TransportSession};

const COMMAND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 256;

/// Errors returned to callers of the controller handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session is not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The driver task has stopped.
    #[error("Session controller stopped")]
    Stopped,
}

enum Command {
    Join {
        stream_id: StreamId,
        role: Role,
        user_id: Option<UserId>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Send {
        event: ClientEvent,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Retry {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Close,
}

/// Handle to one client session.
pub struct ClientSessionController {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl ClientSessionController {
    /// Starts connecting immediately. Returns the handle and the stream of
    /// server events delivered while connected.
    pub fn start(
        transport: Arc<dyn RelayTransport>,
        policy: ReconnectPolicy,
        role: Role,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let state = SessionState::new(role);
        let (snapshot_tx, snapshot) = watch::channel(state.snapshot(&policy));
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (events_tx, events) = mpsc::channel(EVENT_QUEUE);
        let period = policy.heartbeat_period();
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let driver = Driver {
            transport,
            policy,
            state,
            user_id: None,
            link: None,
            inbox: None,
            commands: command_rx,
            snapshot: snapshot_tx,
            events: events_tx,
            heartbeat,
        };
        let task = tokio::spawn(driver.run());

        (
            Self {
                commands,
                snapshot,
                task,
            },
            events,
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Joins a room. While offline the room is remembered and joined on
    /// the next successful handshake.
    pub async fn join_stream(
        &self,
        stream_id: StreamId,
        role: Role,
        user_id: Option<UserId>,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::Join {
            stream_id,
            role,
            user_id,
            reply,
        })
        .await
    }

    /// Leaves the held room and stops rejoining it.
    pub async fn leave_stream(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Leave { reply }).await
    }

    pub async fn send(&self, event: ClientEvent) -> Result<(), SessionError> {
        self.request(|reply| Command::Send { event, reply }).await
    }

    /// Manual retry out of `Failed`. A no-op in any other state.
    pub async fn retry(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Retry { reply }).await
    }

    /// Closes the transport and stops the driver.
    pub async fn close(self) {
        let _ = self.commands.send(Command::Close).await;
        let _ = self.task.await;
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), SessionError>>) -> Command,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)?
    }
}

/// What the driver loop should do after handling a step.
enum Flow {
    Continue,
    Stop,
}

struct Driver {
    transport: Arc<dyn RelayTransport>,
    policy: ReconnectPolicy,
    state: SessionState,
    user_id: Option<UserId>,
    link: Option<Box<dyn TransportLink>>,
    inbox: Option<mpsc::Receiver<TransportEvent>>,
    commands: mpsc::Receiver<Command>,
    snapshot: watch::Sender<SessionSnapshot>,
    events: mpsc::Sender<ServerEvent>,
    heartbeat: Interval,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let flow = match self.state.status() {
                SessionStatus::Connecting => self.first_connect().await,
                SessionStatus::Connected => self.pump().await,
                SessionStatus::Disconnected | SessionStatus::Reconnecting => self.reconnect().await,
                SessionStatus::Failed => self.wait_for_retry().await,
            };
            if let Flow::Stop = flow {
                break;
            }
        }

        if let Some(link) = self.link.take() {
            link.close().await;
        }
        if self.state.status().is_connected() {
            let closed = self.state.on_closed(false, "closed by client");
            self.apply(closed);
        }
        debug!("Session driver stopped");
    }

    async fn first_connect(&mut self) -> Flow {
        match self.transport.open(self.state.role()).await {
            Ok(session) => self.on_open(session).await,
            Err(e) => {
                warn!(error = %e, "Initial handshake failed");
                let closed = self.state.on_closed(false, e.to_string());
                self.apply(closed);
            }
        }
        Flow::Continue
    }

    /// Connected: forward server events and serve commands until the
    /// transport drops or the handle asks to stop.
    async fn pump(&mut self) -> Flow {
        let Some(inbox) = self.inbox.as_mut() else {
            let closed = self.state.on_closed(false, "transport missing");
            self.apply(closed);
            return Flow::Continue;
        };

        tokio::select! {
            event = inbox.recv() => {
                match event {
                    Some(TransportEvent::Message(ServerEvent::ForceDisconnect(f))) => {
                        self.on_transport_closed(true, f.reason);
                    }
                    Some(TransportEvent::Message(ServerEvent::Pong(_))) => {}
                    Some(TransportEvent::Message(event)) => self.forward(event),
                    Some(TransportEvent::Closed { forced, reason }) => {
                        self.on_transport_closed(forced, reason);
                    }
                    None => self.on_transport_closed(false, "transport closed".to_string()),
                }
                Flow::Continue
            }
            command = self.commands.recv() => match command {
                Some(command) => self.handle_online(command).await,
                None => Flow::Stop,
            },
            _ = self.heartbeat.tick() => {
                // A failed ping means the link is gone; the inbox reports the close.
                if let Err(e) = self.send_event(ClientEvent::Ping).await {
                    debug!(error = %e, "Heartbeat not sent");
                }
                Flow::Continue
            }
        }
    }

    /// Disconnected or reconnecting: back off and retry until connected
    /// or the attempt ceiling is reached.
    async fn reconnect(&mut self) -> Flow {
        let delay = match self.state.begin_attempt(&self.policy) {
            Ok(Some(delay)) => delay,
            Ok(None) => {
                warn!(attempts = self.policy.max_attempts, "Reconnect attempts exhausted");
                self.publish();
                return Flow::Continue;
            }
            Err(e) => {
                warn!(error = %e, "Unexpected session transition");
                return Flow::Stop;
            }
        };
        self.publish();
        info!(
            attempt = self.state.attempt(),
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Flow::Stop = self.handle_offline(command) {
                            return Flow::Stop;
                        }
                    }
                    None => return Flow::Stop,
                },
            }
        }

        match self.transport.open(self.state.role()).await {
            Ok(session) => self.on_open(session).await,
            Err(e) => {
                debug!(attempt = self.state.attempt(), error = %e, "Reconnect attempt failed");
                self.state.on_attempt_failed(e.to_string());
                self.publish();
            }
        }
        Flow::Continue
    }

    async fn wait_for_retry(&mut self) -> Flow {
        match self.commands.recv().await {
            Some(Command::Retry { reply }) => {
                let restarted = self.state.restart();
                let result = restarted.map_err(|_| SessionError::NotConnected);
                self.publish();
                let _ = reply.send(result);
                Flow::Continue
            }
            Some(command) => self.handle_offline(command),
            None => Flow::Stop,
        }
    }

    async fn on_open(&mut self, session: TransportSession) {
        let connected = self.state.on_connected();
        self.apply(connected);
        self.link = Some(session.link);
        self.inbox = Some(session.inbox);
        self.heartbeat.reset();
        info!(role = %self.state.role(), "Session connected");

        if let Some(room) = self.state.room().cloned() {
            let rejoin = ClientEvent::JoinStream(JoinStream {
                stream_id: room.clone(),
                user_type: self.state.role(),
                user_id: self.user_id.clone(),
            });
            if let Err(e) = self.send_event(rejoin).await {
                warn!(room_id = %room, error = %e, "Automatic rejoin failed");
            } else {
                debug!(room_id = %room, "Rejoined room after connect");
            }
        }
    }

    fn on_transport_closed(&mut self, forced: bool, reason: String) {
        self.link = None;
        self.inbox = None;
        if forced {
            warn!(reason = %reason, "Session force-closed by server");
        } else {
            info!(reason = %reason, "Session transport dropped");
        }
        let closed = self.state.on_closed(forced, reason);
        self.apply(closed);
    }

    async fn handle_online(&mut self, command: Command) -> Flow {
        match command {
            Command::Join {
                stream_id,
                role,
                user_id,
                reply,
            } => {
                let event = ClientEvent::JoinStream(JoinStream {
                    stream_id: stream_id.clone(),
                    user_type: role,
                    user_id: user_id.clone(),
                });
                let result = self.send_event(event).await;
                if result.is_ok() {
                    self.state.remember_room(stream_id, role);
                    self.user_id = user_id;
                    self.publish();
                }
                let _ = reply.send(result);
            }
            Command::Leave { reply } => {
                let result = match self.state.forget_room() {
                    Some(stream_id) => {
                        self.publish();
                        self.send_event(ClientEvent::LeaveStream(LeaveStream { stream_id }))
                            .await
                    }
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            Command::Send { event, reply } => {
                let _ = reply.send(self.send_event(event).await);
            }
            Command::Retry { reply } => {
                let _ = reply.send(Ok(()));
            }
            Command::Close => return Flow::Stop,
        }
        Flow::Continue
    }

    /// Commands received without an open transport.
    fn handle_offline(&mut self, command: Command) -> Flow {
        match command {
            Command::Join {
                stream_id,
                role,
                user_id,
                reply,
            } => {
                self.state.remember_room(stream_id, role);
                self.user_id = user_id;
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::Leave { reply } => {
                self.state.forget_room();
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::Send { reply, .. } => {
                let _ = reply.send(Err(SessionError::NotConnected));
            }
            Command::Retry { reply } => {
                let _ = reply.send(Ok(()));
            }
            Command::Close => return Flow::Stop,
        }
        Flow::Continue
    }

    async fn send_event(&self, event: ClientEvent) -> Result<(), SessionError> {
        let link = self.link.as_ref().ok_or(SessionError::NotConnected)?;
        link.send(event).await.map_err(SessionError::from)
    }

    fn forward(&self, event: ServerEvent) {
        if self.events.try_send(event).is_err() {
            warn!("Session event queue full or closed, dropping event");
        }
    }

    fn apply(&self, transition: Result<(), ValidationError>) {
        if let Err(e) = transition {
            warn!(error = %e, "Ignored invalid session transition");
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.state.snapshot(&self.policy));
    }
}
