//! Local cache the realtime consumers write into.
//!
//! Both traits assume the implementation serializes its own writes; the
//! pipeline takes no extra lock around them.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{ChatMessage, ConversationKey, ConversationSummary};

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_message(&self, msg_id: &str) -> Result<Option<ChatMessage>, StoreError>;

    /// Insert unless a row with the same id exists. Returns whether a row
    /// was written.
    async fn insert_message(&self, message: &ChatMessage) -> Result<bool, StoreError>;

    /// Insert or replace by id.
    async fn upsert_message(&self, message: &ChatMessage) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    async fn delete_message(&self, msg_id: &str) -> Result<bool, StoreError>;

    /// Id of the newest stored message in a conversation, by send time then
    /// sequence. Conversations are keyed as in [`ChatMessage::key`].
    async fn latest_message_id(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<String>, StoreError>;

    /// Newest `limit` messages of a conversation, oldest first. `chat_id` is
    /// the conversation id, i.e. the peer's id for private chats.
    async fn messages_for_chat(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<ConversationSummary>, StoreError>;

    /// Write a summary, replacing whatever was stored under its key. Last
    /// writer wins.
    async fn put_conversation(&self, summary: &ConversationSummary) -> Result<(), StoreError>;

    /// All summaries, most recent activity first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Clear the unread counter and mention flag. Returns whether the
    /// conversation exists.
    async fn mark_read(&self, key: &ConversationKey) -> Result<bool, StoreError>;
}
