//! Relay domain - connections, rooms, and the event vocabulary.
//!
//! Pure data and invariants only. Locking, delivery, and timing live in
//! the application and adapter layers.

mod connection;
mod errors;
mod protocol;
mod room;

pub use connection::{Connection, Role};
pub use errors::RelayError;
pub use protocol::{
    BroadcastOverlay, ChatMessage, ClientEvent, ErrorPayload, ForceDisconnect, JoinStream,
    JoinStreamSuccess, LeaveStream, OverlayUpdate, PollVote, PollVoteUpdate, Pong, SendChatMessage,
    SendReaction, ServerEvent, StreamStatus, StreamStatusChanged, ViewerCountUpdate,
    ViewerReaction,
};
pub use room::{Room, RoomMember};
