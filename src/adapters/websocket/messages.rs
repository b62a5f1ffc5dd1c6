//! WebSocket framing for relay events.
//!
//! The event vocabulary itself lives in the relay domain; this module
//! only decides how events become frames and which events end a socket.

use std::borrow::Cow;

use axum::extract::ws::{CloseFrame, Message};
use serde::Deserialize;

use crate::domain::relay::{Role, ServerEvent};

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Server-forced disconnect.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Admission rejected; the client should back off and retry.
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// Query parameters accepted on `GET /ws`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub role: Role,
}

/// Encodes an event as a text frame.
pub fn encode(event: &ServerEvent) -> Result<Message, serde_json::Error> {
    serde_json::to_string(event).map(Message::Text)
}

pub fn close_frame(code: u16, reason: impl Into<Cow<'static, str>>) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// The close frame that must follow `event`, if the event ends the socket.
pub fn close_after(event: &ServerEvent) -> Option<Message> {
    match event {
        ServerEvent::ForceDisconnect(f) => Some(close_frame(CLOSE_POLICY_VIOLATION, f.reason.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::StreamId;
    use crate::domain::relay::ForceDisconnect;

    #[test]
    fn events_encode_as_text_frames() {
        let event = ServerEvent::viewer_count(StreamId::new("s1").unwrap(), 3);
        match encode(&event).unwrap() {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["event"], "viewer-count-update");
                assert_eq!(value["data"]["count"], 3);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn force_disconnect_is_followed_by_policy_close() {
        let event = ServerEvent::ForceDisconnect(ForceDisconnect {
            reason: "banned".into(),
        });
        match close_after(&event) {
            Some(Message::Close(Some(frame))) => {
                assert_eq!(frame.code, CLOSE_POLICY_VIOLATION);
                assert_eq!(frame.reason, "banned");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn ordinary_events_do_not_close() {
        let event = ServerEvent::viewer_count(StreamId::new("s1").unwrap(), 1);
        assert!(close_after(&event).is_none());
    }

    #[test]
    fn role_defaults_to_viewer() {
        let params: ConnectParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.role, Role::Viewer);
    }
}
