//! Pure routing of inbound client events.
//!
//! Given the sender's current connection and one parsed event, decides what
//! the relay should do. No I/O and no state mutation happen here, so every
//! validation rule is testable without a socket. A rejected event leaves
//! connection and room state untouched.

use crate::domain::foundation::{StreamId, UserId, ValidationError};
use crate::domain::relay::{
    ChatMessage, ClientEvent, Connection, OverlayUpdate, PollVoteUpdate, Pong, RelayError, Role,
    ServerEvent, ViewerReaction,
};

/// Payload limits applied while routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLimits {
    /// Maximum chat message length in characters. Default: 500
    pub max_chat_message_len: usize,
    pub max_username_len: usize,
    pub max_label_len: usize,
}

impl Default for RouteLimits {
    fn default() -> Self {
        Self {
            max_chat_message_len: 500,
            max_username_len: 64,
            max_label_len: 64,
        }
    }
}

/// What the relay should do with one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayCommand {
    Join {
        stream_id: StreamId,
        role: Role,
        user_id: Option<UserId>,
    },
    Leave {
        stream_id: StreamId,
    },
    /// Fan out to the room, excluding the sender.
    Broadcast {
        stream_id: StreamId,
        event: ServerEvent,
    },
    /// Answer the sender only.
    Reply(ServerEvent),
}

/// Route one event from `sender`.
///
/// `now_ms` stamps fan-out events whose client omitted a timestamp.
pub fn route_client_message(
    sender: &Connection,
    event: ClientEvent,
    limits: &RouteLimits,
    now_ms: i64,
) -> Result<RelayCommand, RelayError> {
    match event {
        ClientEvent::JoinStream(join) => Ok(RelayCommand::Join {
            stream_id: join.stream_id,
            role: join.user_type,
            user_id: join.user_id,
        }),

        ClientEvent::LeaveStream(leave) => Ok(RelayCommand::Leave {
            stream_id: leave.stream_id,
        }),

        ClientEvent::BroadcastOverlay(overlay) => {
            require_member(sender, &overlay.stream_id)?;
            require_label("overlayType", &overlay.overlay_type, limits.max_label_len)?;
            Ok(RelayCommand::Broadcast {
                stream_id: overlay.stream_id.clone(),
                event: ServerEvent::OverlayUpdate(OverlayUpdate {
                    stream_id: overlay.stream_id,
                    overlay_type: overlay.overlay_type,
                    overlay_data: overlay.overlay_data,
                    timestamp: overlay.timestamp.unwrap_or(now_ms),
                }),
            })
        }

        ClientEvent::SendChatMessage(chat) => {
            require_member(sender, &chat.stream_id)?;
            let message = chat.message.trim();
            if message.is_empty() {
                return Err(ValidationError::empty_field("message").into());
            }
            let length = message.chars().count();
            if length > limits.max_chat_message_len {
                return Err(
                    ValidationError::too_long("message", limits.max_chat_message_len, length).into(),
                );
            }
            require_label("username", &chat.username, limits.max_username_len)?;

            Ok(RelayCommand::Broadcast {
                stream_id: chat.stream_id.clone(),
                event: ServerEvent::ChatMessage(ChatMessage {
                    stream_id: chat.stream_id,
                    message: message.to_string(),
                    username: chat.username.trim().to_string(),
                    timestamp: chat.timestamp.unwrap_or(now_ms),
                }),
            })
        }

        ClientEvent::SendReaction(reaction) => {
            require_member(sender, &reaction.stream_id)?;
            require_label("reactionType", &reaction.reaction_type, limits.max_label_len)?;
            Ok(RelayCommand::Broadcast {
                stream_id: reaction.stream_id.clone(),
                event: ServerEvent::ViewerReaction(ViewerReaction {
                    stream_id: reaction.stream_id,
                    reaction_type: reaction.reaction_type,
                    user_id: reaction.user_id.or_else(|| sender.user_id.clone()),
                }),
            })
        }

        ClientEvent::PollVote(vote) => {
            require_member(sender, &vote.stream_id)?;
            require_label("pollId", &vote.poll_id, limits.max_label_len)?;
            require_label("optionId", &vote.option_id, limits.max_label_len)?;
            Ok(RelayCommand::Broadcast {
                stream_id: vote.stream_id.clone(),
                event: ServerEvent::PollVoteUpdate(PollVoteUpdate {
                    stream_id: vote.stream_id,
                    poll_id: vote.poll_id,
                    option_id: vote.option_id,
                    user_id: vote.user_id.or_else(|| sender.user_id.clone()),
                }),
            })
        }

        ClientEvent::Ping => Ok(RelayCommand::Reply(ServerEvent::Pong(Pong {
            timestamp: now_ms,
        }))),
    }
}

fn require_member(sender: &Connection, stream_id: &StreamId) -> Result<(), RelayError> {
    if sender.room_id.as_ref() == Some(stream_id) {
        Ok(())
    } else {
        Err(RelayError::NotInRoom {
            connection_id: sender.id,
            stream_id: stream_id.clone(),
        })
    }
}

fn require_label(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    let length = value.chars().count();
    if length > max {
        return Err(ValidationError::too_long(field, max, length));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConnectionId;
    use crate::domain::relay::{BroadcastOverlay, JoinStream, SendChatMessage, SendReaction};

    const NOW: i64 = 1_700_000_000_000;

    fn stream(id: &str) -> StreamId {
        StreamId::new(id).unwrap()
    }

    fn member_of(id: &str) -> Connection {
        let mut connection = Connection::new(ConnectionId::new(), Role::Viewer);
        connection.room_id = Some(stream(id));
        connection
    }

    fn chat(message: &str) -> ClientEvent {
        ClientEvent::SendChatMessage(SendChatMessage {
            stream_id: stream("s1"),
            message: message.to_string(),
            username: "alice".into(),
            timestamp: None,
        })
    }

    fn route(sender: &Connection, event: ClientEvent) -> Result<RelayCommand, RelayError> {
        route_client_message(sender, event, &RouteLimits::default(), NOW)
    }

    #[test]
    fn join_carries_role_and_user() {
        let sender = Connection::new(ConnectionId::new(), Role::Viewer);
        let command = route(
            &sender,
            ClientEvent::JoinStream(JoinStream {
                stream_id: stream("s1"),
                user_type: Role::Streamer,
                user_id: Some(UserId::new("u-1").unwrap()),
            }),
        )
        .unwrap();

        assert_eq!(
            command,
            RelayCommand::Join {
                stream_id: stream("s1"),
                role: Role::Streamer,
                user_id: Some(UserId::new("u-1").unwrap()),
            }
        );
    }

    #[test]
    fn chat_at_limit_is_accepted() {
        let sender = member_of("s1");
        let command = route(&sender, chat(&"a".repeat(500))).unwrap();
        match command {
            RelayCommand::Broadcast {
                event: ServerEvent::ChatMessage(message),
                ..
            } => {
                assert_eq!(message.message.len(), 500);
                assert_eq!(message.timestamp, NOW);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn oversized_chat_is_rejected() {
        let sender = member_of("s1");
        let err = route(&sender, chat(&"é".repeat(501))).unwrap_err();
        assert_eq!(
            err,
            RelayError::Validation(ValidationError::too_long("message", 500, 501))
        );
    }

    #[test]
    fn blank_chat_is_rejected() {
        let sender = member_of("s1");
        assert!(matches!(
            route(&sender, chat("   ")),
            Err(RelayError::Validation(ValidationError::EmptyField { .. }))
        ));
    }

    #[test]
    fn broadcasting_to_unjoined_room_is_rejected() {
        let sender = member_of("s2");
        let err = route(&sender, chat("hi")).unwrap_err();
        assert!(matches!(err, RelayError::NotInRoom { .. }));
    }

    #[test]
    fn overlay_keeps_client_timestamp() {
        let sender = member_of("s1");
        let command = route(
            &sender,
            ClientEvent::BroadcastOverlay(BroadcastOverlay {
                stream_id: stream("s1"),
                overlay_type: "poll".into(),
                overlay_data: serde_json::json!({"q": 1}),
                timestamp: Some(42),
            }),
        )
        .unwrap();

        match command {
            RelayCommand::Broadcast {
                event: ServerEvent::OverlayUpdate(update),
                ..
            } => {
                assert_eq!(update.timestamp, 42);
                assert_eq!(update.overlay_data, serde_json::json!({"q": 1}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reaction_falls_back_to_connection_user() {
        let mut sender = member_of("s1");
        sender.user_id = Some(UserId::new("u-9").unwrap());
        let command = route(
            &sender,
            ClientEvent::SendReaction(SendReaction {
                stream_id: stream("s1"),
                reaction_type: "heart".into(),
                user_id: None,
            }),
        )
        .unwrap();

        match command {
            RelayCommand::Broadcast {
                event: ServerEvent::ViewerReaction(reaction),
                ..
            } => assert_eq!(reaction.user_id, Some(UserId::new("u-9").unwrap())),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ping_replies_with_pong() {
        let sender = Connection::new(ConnectionId::new(), Role::Viewer);
        assert_eq!(
            route(&sender, ClientEvent::Ping).unwrap(),
            RelayCommand::Reply(ServerEvent::Pong(Pong { timestamp: NOW }))
        );
    }
}
