//! SQLite-backed message and conversation cache.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE messages (
//!     msg_id TEXT PRIMARY KEY,
//!     chat_id TEXT NOT NULL,
//!     chat_type INTEGER NOT NULL,
//!     conv_id TEXT NOT NULL,          -- ChatMessage::key(): peer id for private chats
//!     conv_type INTEGER NOT NULL,
//!     send_time INTEGER NOT NULL,     -- ms since epoch
//!     msg_seq INTEGER NOT NULL,
//!     edit_time INTEGER,
//!     payload TEXT NOT NULL,          -- ChatMessage as JSON
//!     local_insert_time INTEGER NOT NULL
//! );
//!
//! CREATE TABLE conversations (
//!     chat_id TEXT NOT NULL,
//!     chat_type INTEGER NOT NULL,
//!     name TEXT NOT NULL,
//!     preview TEXT NOT NULL,
//!     last_message_time INTEGER NOT NULL,
//!     unread INTEGER NOT NULL,
//!     mentioned INTEGER NOT NULL,
//!     avatar_url TEXT,
//!     do_not_disturb INTEGER NOT NULL,
//!     PRIMARY KEY (chat_id, chat_type)
//! );
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ConversationStore, MessageStore};
use crate::error::StoreError;
use crate::model::{ChatMessage, ConversationKey, ConversationSummary};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    msg_id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    chat_type INTEGER NOT NULL,
    conv_id TEXT NOT NULL,
    conv_type INTEGER NOT NULL,
    send_time INTEGER NOT NULL,
    msg_seq INTEGER NOT NULL,
    edit_time INTEGER,
    payload TEXT NOT NULL,
    local_insert_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conv_id, conv_type, send_time DESC, msg_seq DESC);

CREATE TABLE IF NOT EXISTS conversations (
    chat_id TEXT NOT NULL,
    chat_type INTEGER NOT NULL,
    name TEXT NOT NULL,
    preview TEXT NOT NULL,
    last_message_time INTEGER NOT NULL,
    unread INTEGER NOT NULL DEFAULT 0,
    mentioned INTEGER NOT NULL DEFAULT 0,
    avatar_url TEXT,
    do_not_disturb INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (chat_id, chat_type)
);
"#;

/// Both cache traits over one SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the cache at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened message cache");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn message_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

fn decode_payload(payload: String) -> Result<ChatMessage, StoreError> {
    Ok(serde_json::from_str(&payload)?)
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationSummary> {
    Ok(ConversationSummary {
        chat_id: row.get(0)?,
        chat_type: row.get(1)?,
        name: row.get(2)?,
        preview: row.get(3)?,
        last_message_time: row.get(4)?,
        unread: row.get(5)?,
        mentioned: row.get(6)?,
        avatar_url: row.get(7)?,
        do_not_disturb: row.get(8)?,
    })
}

const SUMMARY_COLUMNS: &str = "chat_id, chat_type, name, preview, last_message_time, unread, \
     mentioned, avatar_url, do_not_disturb";

#[async_trait]
impl MessageStore for SqliteStore {
    async fn get_message(&self, msg_id: &str) -> Result<Option<ChatMessage>, StoreError> {
        let conn = self.conn.lock().await;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM messages WHERE msg_id = ?1",
                params![msg_id],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(decode_payload).transpose()
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(message)?;
        let key = message.key();
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO messages \
             (msg_id, chat_id, chat_type, conv_id, conv_type, send_time, msg_seq, edit_time, \
              payload, local_insert_time) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.msg_id,
                message.chat_id,
                message.chat_type,
                key.chat_id,
                key.chat_type,
                message.send_time,
                message.msg_seq,
                message.edit_time,
                payload,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(rows > 0)
    }

    async fn upsert_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let payload = serde_json::to_string(message)?;
        let key = message.key();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages \
             (msg_id, chat_id, chat_type, conv_id, conv_type, send_time, msg_seq, edit_time, \
              payload, local_insert_time) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(msg_id) DO UPDATE SET \
                chat_id = excluded.chat_id, \
                chat_type = excluded.chat_type, \
                conv_id = excluded.conv_id, \
                conv_type = excluded.conv_type, \
                send_time = excluded.send_time, \
                msg_seq = excluded.msg_seq, \
                edit_time = excluded.edit_time, \
                payload = excluded.payload",
            params![
                message.msg_id,
                message.chat_id,
                message.chat_type,
                key.chat_id,
                key.chat_type,
                message.send_time,
                message.msg_seq,
                message.edit_time,
                payload,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    async fn delete_message(&self, msg_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute("DELETE FROM messages WHERE msg_id = ?1", params![msg_id])?;
        Ok(rows > 0)
    }

    async fn latest_message_id(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().await;
        let id = conn
            .query_row(
                "SELECT msg_id FROM messages WHERE conv_id = ?1 AND conv_type = ?2 \
                 ORDER BY send_time DESC, msg_seq DESC LIMIT 1",
                params![key.chat_id, key.chat_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    async fn messages_for_chat(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT payload FROM messages WHERE conv_id = ?1 \
             ORDER BY send_time DESC, msg_seq DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let payloads = stmt
            .query_map(params![chat_id, limit], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut messages = payloads
            .into_iter()
            .map(decode_payload)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<ConversationSummary>, StoreError> {
        let conn = self.conn.lock().await;
        let summary = conn
            .query_row(
                &format!(
                    "SELECT {SUMMARY_COLUMNS} FROM conversations WHERE chat_id = ?1 AND chat_type = ?2"
                ),
                params![key.chat_id, key.chat_type],
                summary_from_row,
            )
            .optional()?;
        Ok(summary)
    }

    async fn put_conversation(&self, summary: &ConversationSummary) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO conversations ({SUMMARY_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                summary.chat_id,
                summary.chat_type,
                summary.name,
                summary.preview,
                summary.last_message_time,
                summary.unread,
                summary.mentioned,
                summary.avatar_url,
                summary.do_not_disturb,
            ],
        )?;
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM conversations ORDER BY last_message_time DESC"
        ))?;
        let summaries = stmt
            .query_map([], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    async fn mark_read(&self, key: &ConversationKey) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE conversations SET unread = 0, mentioned = 0 \
             WHERE chat_id = ?1 AND chat_type = ?2",
            params![key.chat_id, key.chat_type],
        )?;
        Ok(rows > 0)
    }
}
