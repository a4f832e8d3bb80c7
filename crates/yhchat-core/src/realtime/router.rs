//! Frame → event routing and the broadcast bus events travel on.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use super::codec::DecodedFrame;
use crate::model::{BotBoard, ChatMessage};

/// Events published to every pipeline subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    NewMessage(ChatMessage),
    MessageEdited(ChatMessage),
    /// The message was recalled; local copies should go.
    MessageDeleted {
        msg_id: String,
        chat_id: String,
        chat_type: i32,
    },
    /// Another device of this account changed its draft in a chat.
    DraftUpdated { chat_id: String, input: String },
    BotBoardMessage(BotBoard),
    /// One chunk of a bot reply that is still being generated.
    StreamMessage {
        msg_id: String,
        recv_id: String,
        chat_id: String,
        content: String,
    },
}

impl MessageEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::MessageEdited(_) => "message_edited",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::DraftUpdated { .. } => "draft_updated",
            Self::BotBoardMessage(_) => "bot_board_message",
            Self::StreamMessage { .. } => "stream_message",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Event(MessageEvent),
    /// Nothing for subscribers: acks and commands this client ignores.
    Unhandled { cmd: String, seq: String },
}

/// Map a decoded frame to the event it produces. Pure.
pub fn route(frame: DecodedFrame) -> Routed {
    match frame {
        DecodedFrame::PushMessage { message, .. } if message.is_recalled() => {
            Routed::Event(deleted(message))
        }
        DecodedFrame::PushMessage { message, .. } => {
            Routed::Event(MessageEvent::NewMessage(message))
        }
        DecodedFrame::EditMessage { message, .. } if message.is_recalled() => {
            Routed::Event(deleted(message))
        }
        DecodedFrame::EditMessage { message, .. } => {
            Routed::Event(MessageEvent::MessageEdited(message))
        }
        DecodedFrame::DraftInput { chat_id, input, .. } => {
            Routed::Event(MessageEvent::DraftUpdated { chat_id, input })
        }
        DecodedFrame::BotBoard { board, .. } => Routed::Event(MessageEvent::BotBoardMessage(board)),
        DecodedFrame::StreamMessage {
            msg_id,
            recv_id,
            chat_id,
            content,
            ..
        } => Routed::Event(MessageEvent::StreamMessage {
            msg_id,
            recv_id,
            chat_id,
            content,
        }),
        other @ (DecodedFrame::LoginAck { .. }
        | DecodedFrame::HeartbeatAck { .. }
        | DecodedFrame::Unrecognized { .. }) => Routed::Unhandled {
            cmd: other.cmd().to_string(),
            seq: other.seq().to_string(),
        },
    }
}

fn deleted(message: ChatMessage) -> MessageEvent {
    MessageEvent::MessageDeleted {
        msg_id: message.msg_id,
        chat_id: message.chat_id,
        chat_type: message.chat_type,
    }
}

/// Fan-out channel for [`MessageEvent`]s.
///
/// No replay: a subscriber only sees events published after it subscribed.
/// Each subscriber has its own cursor, so a slow one lags on its own
/// without holding back the others.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MessageEvent>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Never blocks.
    pub fn publish(&self, event: MessageEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receive the next event, logging and skipping over lag.
///
/// Returns `None` once the bus is gone.
pub async fn next_event(
    rx: &mut broadcast::Receiver<MessageEvent>,
    consumer: &str,
) -> Option<MessageEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(consumer, skipped, "Event subscriber lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageContent, MessageSender};

    fn message(msg_id: &str) -> ChatMessage {
        ChatMessage {
            msg_id: msg_id.into(),
            sender: MessageSender {
                chat_id: "u1".into(),
                chat_type: 1,
                name: "Bob".into(),
                ..Default::default()
            },
            chat_id: "123".into(),
            chat_type: 2,
            recv_id: "u0".into(),
            content_type: 1,
            content: MessageContent::text("hi"),
            send_time: 1,
            cmd: None,
            quote_msg_id: None,
            edit_time: None,
            delete_time: None,
            msg_seq: 1,
            direction: Default::default(),
        }
    }

    #[test]
    fn push_routes_to_new_message() {
        let routed = route(DecodedFrame::PushMessage {
            seq: "s".into(),
            message: message("m1"),
        });
        assert_eq!(routed, Routed::Event(MessageEvent::NewMessage(message("m1"))));
    }

    #[test]
    fn edit_routes_to_message_edited() {
        let routed = route(DecodedFrame::EditMessage {
            seq: "s".into(),
            message: message("m1"),
        });
        assert!(matches!(routed, Routed::Event(MessageEvent::MessageEdited(m)) if m.msg_id == "m1"));
    }

    #[test]
    fn recalled_message_routes_to_deleted() {
        let mut recalled = message("m7");
        recalled.delete_time = Some(1_700_000_000_000);
        for frame in [
            DecodedFrame::PushMessage {
                seq: "a".into(),
                message: recalled.clone(),
            },
            DecodedFrame::EditMessage {
                seq: "b".into(),
                message: recalled.clone(),
            },
        ] {
            assert_eq!(
                route(frame),
                Routed::Event(MessageEvent::MessageDeleted {
                    msg_id: "m7".into(),
                    chat_id: "123".into(),
                    chat_type: 2,
                })
            );
        }
    }

    #[test]
    fn draft_board_and_stream_route_to_events() {
        let draft = route(DecodedFrame::DraftInput {
            seq: "s".into(),
            chat_id: "123".into(),
            input: "hel".into(),
        });
        assert_eq!(
            draft,
            Routed::Event(MessageEvent::DraftUpdated {
                chat_id: "123".into(),
                input: "hel".into(),
            })
        );

        let board = route(DecodedFrame::BotBoard {
            seq: "s".into(),
            board: BotBoard::default(),
        });
        assert!(matches!(board, Routed::Event(MessageEvent::BotBoardMessage(_))));

        let stream = route(DecodedFrame::StreamMessage {
            seq: "s".into(),
            msg_id: "m".into(),
            recv_id: "r".into(),
            chat_id: "c".into(),
            content: "tok".into(),
        });
        assert!(matches!(stream, Routed::Event(MessageEvent::StreamMessage { .. })));
    }

    #[test]
    fn acks_and_unknown_are_unhandled() {
        assert_eq!(
            route(DecodedFrame::HeartbeatAck { seq: "h".into() }),
            Routed::Unhandled {
                cmd: "heartbeat_ack".into(),
                seq: "h".into(),
            }
        );
        assert_eq!(
            route(DecodedFrame::LoginAck { seq: "l".into() }),
            Routed::Unhandled {
                cmd: "login_ack".into(),
                seq: "l".into(),
            }
        );
        assert_eq!(
            route(DecodedFrame::Unrecognized {
                cmd: "future_cmd".into(),
                seq: "x".into(),
            }),
            Routed::Unhandled {
                cmd: "future_cmd".into(),
                seq: "x".into(),
            }
        );
    }

    #[test]
    fn event_kinds_are_snake_case() {
        let event = MessageEvent::DraftUpdated {
            chat_id: "1".into(),
            input: String::new(),
        };
        assert_eq!(event.kind(), "draft_updated");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "draft_updated");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(MessageEvent::NewMessage(message("m1")));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_have_independent_cursors() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(MessageEvent::NewMessage(message("m1")));
        bus.publish(MessageEvent::NewMessage(message("m2")));

        assert_eq!(next_event(&mut a, "a").await.unwrap().kind(), "new_message");
        assert_eq!(next_event(&mut a, "a").await, Some(MessageEvent::NewMessage(message("m2"))));
        assert_eq!(next_event(&mut b, "b").await, Some(MessageEvent::NewMessage(message("m1"))));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();
        for i in 0..5 {
            bus.publish(MessageEvent::NewMessage(message(&format!("m{i}"))));
        }
        // Oldest events were overwritten; the subscriber resumes at the
        // oldest one still buffered.
        let next = next_event(&mut slow, "slow").await;
        assert_eq!(next, Some(MessageEvent::NewMessage(message("m3"))));
    }

    #[tokio::test]
    async fn closed_bus_ends_stream() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        drop(bus);
        assert_eq!(next_event(&mut rx, "gone").await, None);
    }
}
