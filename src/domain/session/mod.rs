//! Client session domain.
//!
//! Per-client connection lifecycle as seen from the client side of the
//! relay: status transitions, reconnect attempt bookkeeping, and the
//! snapshot surfaced to UIs.

mod reconnect;
mod state;
mod status;

pub use reconnect::ReconnectPolicy;
pub use state::{SessionSnapshot, SessionState};
pub use status::SessionStatus;
