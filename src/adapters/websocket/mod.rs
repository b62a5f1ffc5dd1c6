//! WebSocket adapter for relay clients.
//!
//! ```text
//!  client ──frames──▶ handler ──ClientEvent──▶ RelayService
//!                                                 │
//!                          ┌──────────────────────┤
//!                          ▼                      ▼
//!                 ConnectionRegistry       RoomBroadcaster
//!                          │                      │
//!                          └──── outbound queue ◀─┘
//!                                       │
//!  client ◀──frames── writer task ◀─────┘
//! ```
//!
//! - [`messages`] - frame encoding and close codes
//! - [`rooms`] - sharded room membership and fan-out
//! - [`handler`] - axum upgrade handler

pub mod handler;
pub mod messages;
pub mod rooms;

pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use messages::{ConnectParams, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, CLOSE_TRY_AGAIN_LATER};
pub use rooms::{FanOut, Membership, RoomBroadcaster};
