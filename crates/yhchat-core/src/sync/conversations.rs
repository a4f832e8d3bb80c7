//! Keeps conversation summaries (preview, time, unread) in step with the
//! realtime stream.
//!
//! Edits only touch a summary when the edited message is the newest one the
//! message cache holds for its chat. That lookup races with the message
//! store adapter, which consumes the same events on its own cursor: an edit
//! that arrives right behind its own push may see a stale "latest" id and be
//! skipped.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{ChatMessage, ChatType, ConversationKey, ConversationSummary, Direction};
use crate::realtime::MessageEvent;
use crate::realtime::router::next_event;
use crate::store::{ConversationStore, MessageStore};

const GROUP_FALLBACK_NAME: &str = "群聊";
const GENERIC_FALLBACK_NAME: &str = "会话";

/// One-line preview of a message, by a fixed field priority: text, image,
/// file, audio, video, sticker, post, then a generic placeholder.
///
/// The content-type discriminant is not consulted.
pub fn preview(message: &ChatMessage) -> String {
    fn present(field: &Option<String>) -> Option<&str> {
        field.as_deref().filter(|s| !s.is_empty())
    }

    let content = &message.content;
    if let Some(text) = present(&content.text) {
        return text.to_string();
    }
    if present(&content.image_url).is_some() {
        return "[图片]".to_string();
    }
    if present(&content.file_url).is_some() {
        return match present(&content.file_name) {
            Some(name) => format!("[文件]{name}"),
            None => "[文件]".to_string(),
        };
    }
    if present(&content.audio_url).is_some() {
        return "语音消息".to_string();
    }
    if present(&content.video_url).is_some() {
        return "视频消息".to_string();
    }
    if present(&content.sticker_url).is_some() {
        return "表情消息".to_string();
    }
    if let Some(title) = present(&content.post_title) {
        return format!("文章消息{title}");
    }
    "[消息]".to_string()
}

/// Conversation a message belongs to in the list. See [`ChatMessage::key`].
pub fn conversation_key(message: &ChatMessage) -> ConversationKey {
    message.key()
}

pub struct ConversationAggregator {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    self_user_id: Option<String>,
}

impl ConversationAggregator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        self_user_id: Option<String>,
    ) -> Self {
        Self {
            conversations,
            messages,
            self_user_id,
        }
    }

    /// Apply one event. Storage failures are logged and swallowed.
    pub async fn handle(&self, event: &MessageEvent) {
        let result = match event {
            MessageEvent::NewMessage(message) => self.on_new_message(message).await,
            MessageEvent::MessageEdited(message) => self.on_edited_message(message).await,
            _ => Ok(()),
        };
        if let Err(err) = result {
            warn!(kind = event.kind(), error = %err, "Failed to update conversation summary");
        }
    }

    pub async fn mark_read(&self, key: &ConversationKey) -> Result<bool, StoreError> {
        self.conversations.mark_read(key).await
    }

    fn is_own(&self, message: &ChatMessage) -> bool {
        message.direction == Direction::Outgoing
            || self
                .self_user_id
                .as_deref()
                .is_some_and(|me| me == message.sender.chat_id)
    }

    async fn on_new_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let key = conversation_key(message);
        let own = self.is_own(message);

        let summary = match self.conversations.get_conversation(&key).await? {
            Some(mut summary) => {
                summary.preview = preview(message);
                summary.last_message_time = message.send_time;
                if !own && !summary.do_not_disturb {
                    summary.unread = summary.unread.saturating_add(1);
                }
                summary
            }
            None => {
                debug!(conversation = %key, "Creating conversation from realtime message");
                let private = key.chat_id == message.sender.chat_id;
                ConversationSummary {
                    name: fallback_name(key.chat_type, message),
                    avatar_url: if private {
                        message.sender.avatar_url.clone()
                    } else {
                        None
                    },
                    preview: preview(message),
                    last_message_time: message.send_time,
                    unread: if own { 0 } else { 1 },
                    mentioned: false,
                    do_not_disturb: false,
                    chat_id: key.chat_id,
                    chat_type: key.chat_type,
                }
            }
        };

        self.conversations.put_conversation(&summary).await
    }

    async fn on_edited_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let key = conversation_key(message);
        let latest = self.messages.latest_message_id(&key).await?;
        if latest.as_deref() != Some(message.msg_id.as_str()) {
            debug!(msg_id = %message.msg_id, "Edited message is not the latest; summary unchanged");
            return Ok(());
        }

        let Some(mut summary) = self.conversations.get_conversation(&key).await? else {
            return Ok(());
        };
        summary.preview = preview(message);
        summary.last_message_time = message.send_time;
        self.conversations.put_conversation(&summary).await
    }

    /// Consume a subscription until cancelled or the bus closes.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<MessageEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = next_event(&mut events, "conversations") => event,
            };
            match event {
                Some(event) => self.handle(&event).await,
                None => break,
            }
        }
        debug!("Conversation aggregator stopped");
    }
}

fn fallback_name(chat_type: i32, message: &ChatMessage) -> String {
    match ChatType::from(chat_type) {
        ChatType::User | ChatType::Bot if !message.sender.name.is_empty() => {
            message.sender.name.clone()
        }
        ChatType::Group => GROUP_FALLBACK_NAME.to_string(),
        _ => GENERIC_FALLBACK_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageContent, MessageSender};
    use crate::store::SqliteStore;

    fn group_message(msg_id: &str, text: &str, send_time: i64) -> ChatMessage {
        ChatMessage {
            msg_id: msg_id.into(),
            sender: MessageSender {
                chat_id: "u1".into(),
                chat_type: 1,
                name: "Bob".into(),
                avatar_url: Some("https://img/bob.png".into()),
                ..Default::default()
            },
            chat_id: "123".into(),
            chat_type: 2,
            recv_id: "me".into(),
            content_type: 1,
            content: MessageContent::text(text),
            send_time,
            cmd: None,
            quote_msg_id: None,
            edit_time: None,
            delete_time: None,
            msg_seq: send_time,
            direction: Direction::Incoming,
        }
    }

    fn private_message(msg_id: &str, text: &str) -> ChatMessage {
        let mut message = group_message(msg_id, text, 50);
        message.chat_id = "me".into();
        message.chat_type = 1;
        message
    }

    fn setup(self_user_id: Option<&str>) -> (ConversationAggregator, SqliteStore) {
        let store = SqliteStore::open_in_memory().unwrap();
        let shared = Arc::new(store.clone());
        (
            ConversationAggregator::new(shared.clone(), shared, self_user_id.map(str::to_string)),
            store,
        )
    }

    #[test]
    fn text_wins_over_image() {
        let mut message = group_message("m", "caption", 1);
        message.content.image_url = Some("https://img/1.png".into());
        assert_eq!(preview(&message), "caption");
    }

    #[test]
    fn file_preview_includes_name() {
        let mut message = group_message("m", "", 1);
        message.content = MessageContent {
            file_url: Some("https://files/report.pdf".into()),
            file_name: Some("report.pdf".into()),
            ..Default::default()
        };
        assert_eq!(preview(&message), "[文件]report.pdf");

        message.content.file_name = None;
        assert_eq!(preview(&message), "[文件]");
    }

    #[test]
    fn preview_priority_after_file() {
        let mut message = group_message("m", "", 1);
        message.content = MessageContent {
            audio_url: Some("a".into()),
            video_url: Some("v".into()),
            sticker_url: Some("s".into()),
            post_title: Some("Weekly".into()),
            ..Default::default()
        };
        assert_eq!(preview(&message), "语音消息");
        message.content.audio_url = None;
        assert_eq!(preview(&message), "视频消息");
        message.content.video_url = None;
        assert_eq!(preview(&message), "表情消息");
        message.content.sticker_url = None;
        assert_eq!(preview(&message), "文章消息Weekly");
        message.content.post_title = None;
        assert_eq!(preview(&message), "[消息]");
    }

    #[test]
    fn empty_text_falls_through() {
        let mut message = group_message("m", "", 1);
        message.content.image_url = Some("i".into());
        assert_eq!(preview(&message), "[图片]");
    }

    #[test]
    fn private_message_maps_to_sender_conversation() {
        assert_eq!(
            conversation_key(&private_message("m", "hey")),
            ConversationKey::new("u1", 1)
        );
        assert_eq!(
            conversation_key(&group_message("m", "hey", 1)),
            ConversationKey::new("123", 2)
        );
    }

    #[tokio::test]
    async fn new_message_synthesizes_missing_group() {
        let (aggregator, store) = setup(None);
        aggregator
            .handle(&MessageEvent::NewMessage(group_message("m1", "hi", 10)))
            .await;

        let summary = store
            .get_conversation(&ConversationKey::new("123", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.name, "群聊");
        assert_eq!(summary.preview, "hi");
        assert_eq!(summary.unread, 1);
        assert_eq!(summary.last_message_time, 10);
        assert_eq!(summary.avatar_url, None);
    }

    #[tokio::test]
    async fn new_private_message_uses_sender_name() {
        let (aggregator, store) = setup(None);
        aggregator
            .handle(&MessageEvent::NewMessage(private_message("m1", "hey")))
            .await;
        let summary = store
            .get_conversation(&ConversationKey::new("u1", 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.name, "Bob");
        assert_eq!(summary.avatar_url.as_deref(), Some("https://img/bob.png"));
    }

    #[tokio::test]
    async fn new_message_increments_existing_summary() {
        let (aggregator, store) = setup(None);
        store
            .put_conversation(&ConversationSummary {
                chat_id: "123".into(),
                chat_type: 2,
                name: "Rustaceans".into(),
                preview: "old".into(),
                last_message_time: 1,
                unread: 4,
                mentioned: true,
                ..Default::default()
            })
            .await
            .unwrap();

        aggregator
            .handle(&MessageEvent::NewMessage(group_message("m1", "new", 20)))
            .await;

        let summary = store
            .get_conversation(&ConversationKey::new("123", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.name, "Rustaceans");
        assert_eq!(summary.preview, "new");
        assert_eq!(summary.last_message_time, 20);
        assert_eq!(summary.unread, 5);
        assert!(summary.mentioned);
    }

    #[tokio::test]
    async fn muted_conversation_keeps_unread() {
        let (aggregator, store) = setup(None);
        store
            .put_conversation(&ConversationSummary {
                chat_id: "123".into(),
                chat_type: 2,
                name: "Noisy".into(),
                do_not_disturb: true,
                ..Default::default()
            })
            .await
            .unwrap();

        aggregator
            .handle(&MessageEvent::NewMessage(group_message("m1", "spam", 5)))
            .await;
        let summary = store
            .get_conversation(&ConversationKey::new("123", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.unread, 0);
        assert_eq!(summary.preview, "spam");
    }

    #[tokio::test]
    async fn own_messages_do_not_count_as_unread() {
        let (aggregator, store) = setup(Some("u1"));
        aggregator
            .handle(&MessageEvent::NewMessage(group_message("m1", "mine", 5)))
            .await;
        let summary = store
            .get_conversation(&ConversationKey::new("123", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.unread, 0);
        assert_eq!(summary.preview, "mine");
    }

    #[tokio::test]
    async fn edit_of_latest_message_updates_preview() {
        let (aggregator, store) = setup(None);
        let original = group_message("m1", "typo", 10);
        store.insert_message(&original).await.unwrap();
        aggregator
            .handle(&MessageEvent::NewMessage(original))
            .await;

        aggregator
            .handle(&MessageEvent::MessageEdited(group_message("m1", "fixed", 10)))
            .await;
        let summary = store
            .get_conversation(&ConversationKey::new("123", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.preview, "fixed");
        assert_eq!(summary.unread, 1);
    }

    #[tokio::test]
    async fn edit_of_older_message_is_ignored() {
        let (aggregator, store) = setup(None);
        for message in [group_message("m1", "first", 10), group_message("m2", "second", 20)] {
            store.insert_message(&message).await.unwrap();
            aggregator.handle(&MessageEvent::NewMessage(message)).await;
        }

        aggregator
            .handle(&MessageEvent::MessageEdited(group_message("m1", "edited", 10)))
            .await;
        let summary = store
            .get_conversation(&ConversationKey::new("123", 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.preview, "second");
    }

    #[tokio::test]
    async fn private_edit_is_gated_per_sender() {
        let (aggregator, store) = setup(Some("me"));
        let from = |msg_id: &str, sender: &str, text: &str, send_time: i64| {
            let mut message = private_message(msg_id, text);
            message.sender.chat_id = sender.into();
            message.send_time = send_time;
            message.msg_seq = send_time;
            message
        };

        for message in [from("m1", "alice", "typo", 1000), from("m2", "bob", "yo", 2000)] {
            store.insert_message(&message).await.unwrap();
            aggregator.handle(&MessageEvent::NewMessage(message)).await;
        }

        let edited = from("m1", "alice", "fixed", 1000);
        store.upsert_message(&edited).await.unwrap();
        aggregator.handle(&MessageEvent::MessageEdited(edited)).await;

        let alice = store
            .get_conversation(&ConversationKey::new("alice", 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.preview, "fixed");
        let bob = store
            .get_conversation(&ConversationKey::new("bob", 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bob.preview, "yo");
    }

    #[tokio::test]
    async fn edit_before_insert_is_ignored() {
        let (aggregator, store) = setup(None);
        aggregator
            .handle(&MessageEvent::MessageEdited(group_message("m1", "edited", 10)))
            .await;
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_read_clears_counters() {
        let (aggregator, store) = setup(None);
        aggregator
            .handle(&MessageEvent::NewMessage(group_message("m1", "hi", 10)))
            .await;
        let key = ConversationKey::new("123", 2);
        assert!(aggregator.mark_read(&key).await.unwrap());
        assert_eq!(
            store.get_conversation(&key).await.unwrap().unwrap().unread,
            0
        );
    }
}
