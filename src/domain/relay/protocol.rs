//! Event vocabulary exchanged between clients and the relay.
//!
//! Every frame is a JSON object `{"event": "<kebab-name>", "data": {...}}`.
//!
//! - Client → Server: join/leave, overlay, chat, reaction, poll vote, ping
//! - Server → Client: join ack, viewer counts, the fanned-out events,
//!   stream status, errors, pong, forced disconnect

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConnectionId, ErrorCode, StreamId, UserId};

use super::Role;

// ============================================
// Client → Server Messages
// ============================================

/// All events a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinStream(JoinStream),
    LeaveStream(LeaveStream),
    BroadcastOverlay(BroadcastOverlay),
    SendChatMessage(SendChatMessage),
    SendReaction(SendReaction),
    PollVote(PollVote),
    /// Application-level heartbeat.
    Ping,
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinStream(_) => "join-stream",
            ClientEvent::LeaveStream(_) => "leave-stream",
            ClientEvent::BroadcastOverlay(_) => "broadcast-overlay",
            ClientEvent::SendChatMessage(_) => "send-chat-message",
            ClientEvent::SendReaction(_) => "send-reaction",
            ClientEvent::PollVote(_) => "poll-vote",
            ClientEvent::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStream {
    pub stream_id: StreamId,
    #[serde(default)]
    pub user_type: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveStream {
    pub stream_id: StreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOverlay {
    pub stream_id: StreamId,
    pub overlay_type: String,
    #[serde(default)]
    pub overlay_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessage {
    pub stream_id: StreamId,
    pub message: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReaction {
    pub stream_id: StreamId,
    pub reaction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollVote {
    pub stream_id: StreamId,
    pub poll_id: String,
    pub option_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

// ============================================
// Server → Client Messages
// ============================================

/// All events the relay may send to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    JoinStreamSuccess(JoinStreamSuccess),
    ViewerCountUpdate(ViewerCountUpdate),
    OverlayUpdate(OverlayUpdate),
    ChatMessage(ChatMessage),
    ViewerReaction(ViewerReaction),
    PollVoteUpdate(PollVoteUpdate),
    StreamStatusChanged(StreamStatusChanged),
    Error(ErrorPayload),
    Pong(Pong),
    ForceDisconnect(ForceDisconnect),
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::JoinStreamSuccess(_) => "join-stream-success",
            ServerEvent::ViewerCountUpdate(_) => "viewer-count-update",
            ServerEvent::OverlayUpdate(_) => "overlay-update",
            ServerEvent::ChatMessage(_) => "chat-message",
            ServerEvent::ViewerReaction(_) => "viewer-reaction",
            ServerEvent::PollVoteUpdate(_) => "poll-vote-update",
            ServerEvent::StreamStatusChanged(_) => "stream-status-changed",
            ServerEvent::Error(_) => "error",
            ServerEvent::Pong(_) => "pong",
            ServerEvent::ForceDisconnect(_) => "force-disconnect",
        }
    }

    /// Builds an `error` event from a code and message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: code.as_str().to_string(),
            message: message.into(),
        })
    }

    pub fn viewer_count(stream_id: StreamId, count: usize) -> Self {
        ServerEvent::ViewerCountUpdate(ViewerCountUpdate { stream_id, count })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStreamSuccess {
    pub stream_id: StreamId,
    pub connection_id: ConnectionId,
    pub viewer_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCountUpdate {
    pub stream_id: StreamId,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayUpdate {
    pub stream_id: StreamId,
    pub overlay_type: String,
    pub overlay_data: serde_json::Value,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub stream_id: StreamId,
    pub message: String,
    pub username: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerReaction {
    pub stream_id: StreamId,
    pub reaction_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollVoteUpdate {
    pub stream_id: StreamId,
    pub poll_id: String,
    pub option_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Lifecycle status of a live stream at the video provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Idle,
    Connected,
    Active,
    Disconnected,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusChanged {
    pub stream_id: StreamId,
    pub status: StreamStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceDisconnect {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_stream_parses_from_client_json() {
        let raw = json!({
            "event": "join-stream",
            "data": {"streamId": "s1", "userType": "streamer", "userId": "u-1"}
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();

        match event {
            ClientEvent::JoinStream(join) => {
                assert_eq!(join.stream_id.as_str(), "s1");
                assert_eq!(join.user_type, Role::Streamer);
                assert_eq!(join.user_id.unwrap().as_str(), "u-1");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn join_stream_defaults_to_viewer() {
        let raw = json!({"event": "join-stream", "data": {"streamId": "s1"}});
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            event,
            ClientEvent::JoinStream(JoinStream { user_type: Role::Viewer, .. })
        ));
    }

    #[test]
    fn ping_has_no_data() {
        let event: ClientEvent = serde_json::from_value(json!({"event": "ping"})).unwrap();
        assert_eq!(event, ClientEvent::Ping);
    }

    #[test]
    fn empty_stream_id_is_rejected_at_parse_time() {
        let raw = json!({"event": "leave-stream", "data": {"streamId": ""}});
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn viewer_count_update_serializes_with_kebab_event_name() {
        let event = ServerEvent::viewer_count(StreamId::new("s1").unwrap(), 2);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "viewer-count-update");
        assert_eq!(value["data"]["streamId"], "s1");
        assert_eq!(value["data"]["count"], 2);
        assert_eq!(event.name(), "viewer-count-update");
    }

    #[test]
    fn error_event_carries_code() {
        let event = ServerEvent::error(ErrorCode::ValidationFailed, "too long");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["code"], "VALIDATION_FAILED");
        assert_eq!(value["data"]["message"], "too long");
    }

    #[test]
    fn stream_status_serializes_lowercase() {
        let event = ServerEvent::StreamStatusChanged(StreamStatusChanged {
            stream_id: StreamId::new("live-1").unwrap(),
            status: StreamStatus::Active,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["data"]["status"], "active");
    }
}
