//! Persists realtime message events into the local cache.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::realtime::MessageEvent;
use crate::realtime::router::next_event;
use crate::store::MessageStore;

pub struct MessageStoreAdapter {
    store: Arc<dyn MessageStore>,
}

impl MessageStoreAdapter {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Apply one event. Storage failures are logged and swallowed.
    pub async fn handle(&self, event: &MessageEvent) {
        if let Err(err) = self.apply(event).await {
            warn!(kind = event.kind(), error = %err, "Failed to persist message event");
        }
    }

    async fn apply(&self, event: &MessageEvent) -> Result<(), StoreError> {
        match event {
            MessageEvent::NewMessage(message) => {
                // Existence check and insert are separate steps; the insert
                // also ignores duplicates.
                if self.store.get_message(&message.msg_id).await?.is_some() {
                    debug!(msg_id = %message.msg_id, "Message already cached");
                    return Ok(());
                }
                if self.store.insert_message(message).await? {
                    debug!(msg_id = %message.msg_id, chat_id = %message.chat_id, "Cached message");
                }
            }
            MessageEvent::MessageEdited(message) => {
                self.store.upsert_message(message).await?;
                debug!(msg_id = %message.msg_id, "Cached edit");
            }
            MessageEvent::MessageDeleted { msg_id, .. } => {
                if !self.store.delete_message(msg_id).await? {
                    debug!(msg_id = %msg_id, "Deleted message was not cached");
                }
            }
            MessageEvent::DraftUpdated { .. }
            | MessageEvent::BotBoardMessage(_)
            | MessageEvent::StreamMessage { .. } => {}
        }
        Ok(())
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
                event = next_event(&mut events, "message_store") => event,
            };
            match event {
                Some(event) => self.handle(&event).await,
                None => break,
            }
        }
        debug!("Message store adapter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatMessage, ConversationKey, MessageContent, MessageSender};
    use crate::realtime::EventBus;
    use crate::store::SqliteStore;
    use async_trait::async_trait;

    fn message(msg_id: &str, text: &str) -> ChatMessage {
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
            content: MessageContent::text(text),
            send_time: 1_000,
            cmd: None,
            quote_msg_id: None,
            edit_time: None,
            delete_time: None,
            msg_seq: 1,
            direction: Default::default(),
        }
    }

    fn adapter() -> (MessageStoreAdapter, SqliteStore) {
        let store = SqliteStore::open_in_memory().unwrap();
        (MessageStoreAdapter::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn same_new_message_twice_stores_one_row() {
        let (adapter, store) = adapter();
        let event = MessageEvent::NewMessage(message("m1", "hi"));
        adapter.handle(&event).await;
        adapter.handle(&event).await;
        assert_eq!(store.message_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_push_does_not_overwrite() {
        let (adapter, store) = adapter();
        adapter
            .handle(&MessageEvent::NewMessage(message("m1", "first")))
            .await;
        adapter
            .handle(&MessageEvent::NewMessage(message("m1", "second")))
            .await;
        let stored = store.get_message("m1").await.unwrap().unwrap();
        assert_eq!(stored.content.text.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn edit_is_idempotent() {
        let (adapter, store) = adapter();
        adapter
            .handle(&MessageEvent::NewMessage(message("m1", "typo")))
            .await;

        let mut edited = message("m1", "fixed");
        edited.edit_time = Some(2_000);
        let event = MessageEvent::MessageEdited(edited.clone());

        adapter.handle(&event).await;
        let once = store.get_message("m1").await.unwrap();
        adapter.handle(&event).await;
        let twice = store.get_message("m1").await.unwrap();

        assert_eq!(once, Some(edited));
        assert_eq!(once, twice);
        assert_eq!(store.message_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn edit_of_unknown_message_inserts_it() {
        let (adapter, store) = adapter();
        adapter
            .handle(&MessageEvent::MessageEdited(message("m9", "late")))
            .await;
        assert!(store.get_message("m9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_missing_id_changes_nothing() {
        let (adapter, store) = adapter();
        adapter
            .handle(&MessageEvent::NewMessage(message("m1", "keep")))
            .await;
        adapter
            .handle(&MessageEvent::MessageDeleted {
                msg_id: "ghost".into(),
                chat_id: "123".into(),
                chat_type: 2,
            })
            .await;
        assert_eq!(store.message_count().await.unwrap(), 1);

        adapter
            .handle(&MessageEvent::MessageDeleted {
                msg_id: "m1".into(),
                chat_id: "123".into(),
                chat_type: 2,
            })
            .await;
        assert_eq!(store.message_count().await.unwrap(), 0);
    }

    struct BrokenStore;

    #[async_trait]
    impl MessageStore for BrokenStore {
        async fn get_message(&self, _: &str) -> Result<Option<ChatMessage>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        async fn insert_message(&self, _: &ChatMessage) -> Result<bool, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        async fn upsert_message(&self, _: &ChatMessage) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        async fn delete_message(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        async fn latest_message_id(
            &self,
            _: &ConversationKey,
        ) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
        async fn messages_for_chat(&self, _: &str, _: usize) -> Result<Vec<ChatMessage>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn storage_failures_do_not_stop_the_adapter() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            MessageStoreAdapter::new(Arc::new(BrokenStore)).run(rx, cancel.clone()),
        );

        bus.publish(MessageEvent::NewMessage(message("m1", "a")));
        bus.publish(MessageEvent::MessageEdited(message("m1", "b")));
        bus.publish(MessageEvent::MessageDeleted {
            msg_id: "m1".into(),
            chat_id: "123".into(),
            chat_type: 2,
        });
        tokio::task::yield_now().await;

        assert!(!task.is_finished());
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn run_persists_until_bus_closes() {
        let (adapter, store) = adapter();
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        let task = tokio::spawn(adapter.run(rx, CancellationToken::new()));

        bus.publish(MessageEvent::NewMessage(message("m1", "a")));
        bus.publish(MessageEvent::NewMessage(message("m2", "b")));
        drop(bus);
        task.await.unwrap();

        assert_eq!(store.message_count().await.unwrap(), 2);
    }
}
