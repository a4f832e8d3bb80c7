//! Protobuf frame types of the Yhchat realtime backend (`chat_ws_go`).
//! Declared by hand; field numbers follow the backend's wire output.

/// Header present on every inbound frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Info {
    #[prost(string, tag = "1")]
    pub seq: String,
    #[prost(string, tag = "2")]
    pub cmd: String,
}

/// Minimal view of any inbound frame, parsed first to learn its `cmd`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub info: Option<Info>,
}

pub type HeartbeatAck = Envelope;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Tag {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "3")]
    pub text: String,
    #[prost(string, tag = "4")]
    pub color: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Sender {
    #[prost(string, tag = "1")]
    pub chat_id: String,
    #[prost(int32, tag = "2")]
    pub chat_type: i32,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub avatar_url: String,
    #[prost(string, repeated, tag = "6")]
    pub tag_old: Vec<String>,
    #[prost(message, repeated, tag = "7")]
    pub tag: Vec<Tag>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Content {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(string, tag = "2")]
    pub buttons: String,
    #[prost(string, tag = "3")]
    pub image_url: String,
    #[prost(string, tag = "4")]
    pub file_name: String,
    #[prost(string, tag = "5")]
    pub file_url: String,
    #[prost(string, tag = "7")]
    pub form: String,
    #[prost(string, tag = "8")]
    pub quote_msg_text: String,
    #[prost(string, tag = "9")]
    pub sticker_url: String,
    #[prost(string, tag = "10")]
    pub post_id: String,
    #[prost(string, tag = "11")]
    pub post_title: String,
    #[prost(string, tag = "12")]
    pub post_content: String,
    #[prost(string, tag = "13")]
    pub post_content_type: String,
    #[prost(string, tag = "15")]
    pub expression_id: String,
    #[prost(int64, tag = "18")]
    pub file_size: i64,
    #[prost(string, tag = "19")]
    pub video_url: String,
    #[prost(string, tag = "21")]
    pub audio_url: String,
    #[prost(int64, tag = "22")]
    pub audio_time: i64,
    #[prost(int64, tag = "25")]
    pub sticker_item_id: i64,
    #[prost(int64, tag = "26")]
    pub sticker_pack_id: i64,
    #[prost(string, tag = "29")]
    pub call_text: String,
    #[prost(string, tag = "32")]
    pub call_status_text: String,
    #[prost(int64, tag = "33")]
    pub width: i64,
    #[prost(int64, tag = "34")]
    pub height: i64,
}

/// Bot command attached to a message sent through a slash command.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Cmd {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WsMsg {
    #[prost(string, tag = "1")]
    pub msg_id: String,
    #[prost(message, optional, tag = "2")]
    pub sender: Option<Sender>,
    #[prost(string, tag = "3")]
    pub recv_id: String,
    #[prost(string, tag = "4")]
    pub chat_id: String,
    #[prost(int32, tag = "5")]
    pub chat_type: i32,
    #[prost(message, optional, tag = "6")]
    pub content: Option<Content>,
    #[prost(int32, tag = "7")]
    pub content_type: i32,
    #[prost(int64, tag = "8")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "9")]
    pub cmd: Option<Cmd>,
    #[prost(int64, tag = "10")]
    pub delete_time: i64,
    #[prost(string, tag = "11")]
    pub quote_msg_id: String,
    #[prost(int64, tag = "12")]
    pub msg_seq: i64,
    #[prost(int64, tag = "14")]
    pub edit_time: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgData {
    #[prost(string, tag = "1")]
    pub any: String,
    #[prost(message, optional, tag = "2")]
    pub msg: Option<WsMsg>,
}

/// `push_message` frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PushMessage {
    #[prost(message, optional, tag = "1")]
    pub info: Option<Info>,
    #[prost(message, optional, tag = "2")]
    pub data: Option<MsgData>,
}

/// `edit_message` frame; same layout as a push.
pub type EditMessage = PushMessage;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Draft {
    #[prost(string, tag = "1")]
    pub chat_id: String,
    #[prost(string, tag = "2")]
    pub input: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DraftData {
    #[prost(message, optional, tag = "1")]
    pub draft: Option<Draft>,
}

/// `draft_input` frame: another device of this account edited a draft.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DraftInput {
    #[prost(message, optional, tag = "1")]
    pub info: Option<Info>,
    #[prost(message, optional, tag = "2")]
    pub data: Option<DraftData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Board {
    #[prost(string, tag = "1")]
    pub bot_id: String,
    #[prost(string, tag = "2")]
    pub chat_id: String,
    #[prost(int32, tag = "3")]
    pub chat_type: i32,
    #[prost(string, tag = "4")]
    pub content: String,
    #[prost(int32, tag = "5")]
    pub content_type: i32,
    #[prost(int64, tag = "6")]
    pub last_update_time: i64,
    #[prost(string, tag = "7")]
    pub bot_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BoardData {
    #[prost(message, optional, tag = "1")]
    pub board: Option<Board>,
}

/// `bot_board_message` frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BotBoardMessage {
    #[prost(message, optional, tag = "1")]
    pub info: Option<Info>,
    #[prost(message, optional, tag = "2")]
    pub data: Option<BoardData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamMsg {
    #[prost(string, tag = "1")]
    pub msg_id: String,
    #[prost(string, tag = "2")]
    pub recv_id: String,
    #[prost(string, tag = "3")]
    pub chat_id: String,
    #[prost(string, tag = "4")]
    pub content: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamData {
    #[prost(message, optional, tag = "1")]
    pub msg: Option<StreamMsg>,
}

/// `stream_message` frame: one chunk of a bot reply being streamed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamMessage {
    #[prost(message, optional, tag = "1")]
    pub info: Option<Info>,
    #[prost(message, optional, tag = "2")]
    pub data: Option<StreamData>,
}

/// Command tags.
pub const CMD_LOGIN_ACK: &str = "login_ack";
pub const CMD_HEARTBEAT_ACK: &str = "heartbeat_ack";
pub const CMD_PUSH_MESSAGE: &str = "push_message";
pub const CMD_EDIT_MESSAGE: &str = "edit_message";
pub const CMD_DRAFT_INPUT: &str = "draft_input";
pub const CMD_BOT_BOARD_MESSAGE: &str = "bot_board_message";
pub const CMD_STREAM_MESSAGE: &str = "stream_message";
