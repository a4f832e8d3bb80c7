//! Value types flowing through the realtime pipeline.

use serde::{Deserialize, Serialize};

/// Content-type discriminant carried by every chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ContentType {
    Text,
    Image,
    Markdown,
    File,
    Form,
    Post,
    Sticker,
    Html,
    Audio,
    Call,
    Other(i32),
}

impl From<i32> for ContentType {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Text,
            2 => Self::Image,
            3 => Self::Markdown,
            4 => Self::File,
            5 => Self::Form,
            6 => Self::Post,
            7 => Self::Sticker,
            8 => Self::Html,
            11 => Self::Audio,
            13 => Self::Call,
            other => Self::Other(other),
        }
    }
}

impl From<ContentType> for i32 {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Text => 1,
            ContentType::Image => 2,
            ContentType::Markdown => 3,
            ContentType::File => 4,
            ContentType::Form => 5,
            ContentType::Post => 6,
            ContentType::Sticker => 7,
            ContentType::Html => 8,
            ContentType::Audio => 11,
            ContentType::Call => 13,
            ContentType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatType {
    User,
    Group,
    Bot,
    Other(i32),
}

impl From<i32> for ChatType {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::User,
            2 => Self::Group,
            3 => Self::Bot,
            other => Self::Other(other),
        }
    }
}

impl From<ChatType> for i32 {
    fn from(value: ChatType) -> Self {
        match value {
            ChatType::User => 1,
            ChatType::Group => 2,
            ChatType::Bot => 3,
            ChatType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Incoming,
    /// Echo of a message this account sent from another device.
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageTag {
    pub id: i64,
    pub text: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageSender {
    pub chat_id: String,
    pub chat_type: i32,
    pub name: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub tag_old: Vec<String>,
    #[serde(default)]
    pub tags: Vec<MessageTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageCmd {
    pub id: i64,
    pub name: String,
}

/// Every field is optional; which ones are meaningful depends on the
/// message's [`ContentType`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContent {
    pub text: Option<String>,
    pub buttons: Option<String>,
    pub image_url: Option<String>,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub form: Option<String>,
    pub quote_msg_text: Option<String>,
    pub sticker_url: Option<String>,
    pub post_id: Option<String>,
    pub post_title: Option<String>,
    pub post_content: Option<String>,
    pub post_content_type: Option<String>,
    pub expression_id: Option<String>,
    pub file_size: Option<i64>,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_time: Option<i64>,
    pub sticker_item_id: Option<i64>,
    pub sticker_pack_id: Option<i64>,
    pub call_text: Option<String>,
    pub call_status_text: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub msg_id: String,
    pub sender: MessageSender,
    pub chat_id: String,
    pub chat_type: i32,
    pub recv_id: String,
    pub content_type: i32,
    pub content: MessageContent,
    /// Milliseconds since the epoch
    pub send_time: i64,
    pub cmd: Option<MessageCmd>,
    pub quote_msg_id: Option<String>,
    pub edit_time: Option<i64>,
    pub delete_time: Option<i64>,
    pub msg_seq: i64,
    #[serde(default)]
    pub direction: Direction,
}

impl ChatMessage {
    pub fn kind(&self) -> ContentType {
        ContentType::from(self.content_type)
    }

    /// Conversation this message belongs to.
    ///
    /// A private message addressed to this account carries the account's own
    /// id as `chat_id`; the conversation is then the sender's.
    pub fn key(&self) -> ConversationKey {
        if self.chat_id == self.recv_id {
            ConversationKey::new(self.sender.chat_id.clone(), self.sender.chat_type)
        } else {
            ConversationKey::new(self.chat_id.clone(), self.chat_type)
        }
    }

    pub fn is_recalled(&self) -> bool {
        self.delete_time.is_some()
    }
}

/// Composite identity of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub chat_id: String,
    pub chat_type: i32,
}

impl ConversationKey {
    pub fn new(chat_id: impl Into<String>, chat_type: i32) -> Self {
        Self {
            chat_id: chat_id.into(),
            chat_type,
        }
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.chat_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub chat_id: String,
    pub chat_type: i32,
    pub name: String,
    pub preview: String,
    /// Milliseconds since the epoch
    pub last_message_time: i64,
    pub unread: u32,
    /// Someone mentioned this account since the conversation was last read.
    pub mentioned: bool,
    pub avatar_url: Option<String>,
    pub do_not_disturb: bool,
}

impl ConversationSummary {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.chat_id.clone(), self.chat_type)
    }
}

/// Pinned board content a bot published into a chat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BotBoard {
    pub bot_id: String,
    pub chat_id: String,
    pub chat_type: i32,
    pub content: String,
    pub content_type: i32,
    pub last_update_time: i64,
    pub bot_name: String,
}
