//! Frame codec for the realtime backend.
//!
//! Inbound frames are raw protobuf without a schema id. Every frame starts
//! with the same `info { seq, cmd }` header, so decoding happens in two
//! passes: read the header through [`proto::Envelope`], then parse the same
//! bytes again with the message type that `cmd` names.
//!
//! Outbound frames (login, heartbeat, draft) are JSON text:
//! `{"seq": "<32 hex>", "cmd": "<tag>", "data": {..}}`.

use prost::Message as _;
use serde::Serialize;

use super::proto;
use crate::error::{CodecError, DecodeError};
use crate::model::{
    BotBoard, ChatMessage, Direction, MessageCmd, MessageContent, MessageSender, MessageTag,
};

pub const CMD_LOGIN: &str = "login";
pub const CMD_HEARTBEAT: &str = "heartbeat";
pub const CMD_DRAFT_INPUT: &str = proto::CMD_DRAFT_INPUT;

/// One inbound frame after both decode passes.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    LoginAck {
        seq: String,
    },
    HeartbeatAck {
        seq: String,
    },
    PushMessage {
        seq: String,
        message: ChatMessage,
    },
    EditMessage {
        seq: String,
        message: ChatMessage,
    },
    DraftInput {
        seq: String,
        chat_id: String,
        input: String,
    },
    BotBoard {
        seq: String,
        board: BotBoard,
    },
    StreamMessage {
        seq: String,
        msg_id: String,
        recv_id: String,
        chat_id: String,
        content: String,
    },
    /// A command this client does not know. Kept so newer backends do not
    /// break older clients.
    Unrecognized {
        cmd: String,
        seq: String,
    },
}

impl DecodedFrame {
    pub fn cmd(&self) -> &str {
        match self {
            Self::LoginAck { .. } => proto::CMD_LOGIN_ACK,
            Self::HeartbeatAck { .. } => proto::CMD_HEARTBEAT_ACK,
            Self::PushMessage { .. } => proto::CMD_PUSH_MESSAGE,
            Self::EditMessage { .. } => proto::CMD_EDIT_MESSAGE,
            Self::DraftInput { .. } => proto::CMD_DRAFT_INPUT,
            Self::BotBoard { .. } => proto::CMD_BOT_BOARD_MESSAGE,
            Self::StreamMessage { .. } => proto::CMD_STREAM_MESSAGE,
            Self::Unrecognized { cmd, .. } => cmd,
        }
    }

    pub fn seq(&self) -> &str {
        match self {
            Self::LoginAck { seq }
            | Self::HeartbeatAck { seq }
            | Self::PushMessage { seq, .. }
            | Self::EditMessage { seq, .. }
            | Self::DraftInput { seq, .. }
            | Self::BotBoard { seq, .. }
            | Self::StreamMessage { seq, .. }
            | Self::Unrecognized { seq, .. } => seq,
        }
    }
}

/// Decode one binary frame.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, DecodeError> {
    let info = proto::Envelope::decode(bytes)?.info.unwrap_or_default();
    let seq = info.seq;
    let cmd = info.cmd;

    let frame = match cmd.as_str() {
        proto::CMD_LOGIN_ACK => DecodedFrame::LoginAck { seq },
        proto::CMD_HEARTBEAT_ACK => DecodedFrame::HeartbeatAck { seq },
        proto::CMD_PUSH_MESSAGE => {
            let msg = proto::PushMessage::decode(bytes)?
                .data
                .and_then(|d| d.msg)
                .ok_or(DecodeError::MissingPayload { cmd })?;
            DecodedFrame::PushMessage {
                seq,
                message: chat_message_from_proto(msg),
            }
        }
        proto::CMD_EDIT_MESSAGE => {
            let msg = proto::EditMessage::decode(bytes)?
                .data
                .and_then(|d| d.msg)
                .ok_or(DecodeError::MissingPayload { cmd })?;
            DecodedFrame::EditMessage {
                seq,
                message: chat_message_from_proto(msg),
            }
        }
        proto::CMD_DRAFT_INPUT => {
            let draft = proto::DraftInput::decode(bytes)?
                .data
                .and_then(|d| d.draft)
                .ok_or(DecodeError::MissingPayload { cmd })?;
            DecodedFrame::DraftInput {
                seq,
                chat_id: draft.chat_id,
                input: draft.input,
            }
        }
        proto::CMD_BOT_BOARD_MESSAGE => {
            let board = proto::BotBoardMessage::decode(bytes)?
                .data
                .and_then(|d| d.board)
                .ok_or(DecodeError::MissingPayload { cmd })?;
            DecodedFrame::BotBoard {
                seq,
                board: BotBoard {
                    bot_id: board.bot_id,
                    chat_id: board.chat_id,
                    chat_type: board.chat_type,
                    content: board.content,
                    content_type: board.content_type,
                    last_update_time: board.last_update_time,
                    bot_name: board.bot_name,
                },
            }
        }
        proto::CMD_STREAM_MESSAGE => {
            let msg = proto::StreamMessage::decode(bytes)?
                .data
                .and_then(|d| d.msg)
                .ok_or(DecodeError::MissingPayload { cmd })?;
            DecodedFrame::StreamMessage {
                seq,
                msg_id: msg.msg_id,
                recv_id: msg.recv_id,
                chat_id: msg.chat_id,
                content: msg.content,
            }
        }
        _ => DecodedFrame::Unrecognized { cmd, seq },
    };

    Ok(frame)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn non_zero(value: i64) -> Option<i64> {
    if value == 0 { None } else { Some(value) }
}

fn content_from_proto(c: proto::Content) -> MessageContent {
    MessageContent {
        text: non_empty(c.text),
        buttons: non_empty(c.buttons),
        image_url: non_empty(c.image_url),
        file_name: non_empty(c.file_name),
        file_url: non_empty(c.file_url),
        form: non_empty(c.form),
        quote_msg_text: non_empty(c.quote_msg_text),
        sticker_url: non_empty(c.sticker_url),
        post_id: non_empty(c.post_id),
        post_title: non_empty(c.post_title),
        post_content: non_empty(c.post_content),
        post_content_type: non_empty(c.post_content_type),
        expression_id: non_empty(c.expression_id),
        file_size: non_zero(c.file_size),
        video_url: non_empty(c.video_url),
        audio_url: non_empty(c.audio_url),
        audio_time: non_zero(c.audio_time),
        sticker_item_id: non_zero(c.sticker_item_id),
        sticker_pack_id: non_zero(c.sticker_pack_id),
        call_text: non_empty(c.call_text),
        call_status_text: non_empty(c.call_status_text),
        width: non_zero(c.width),
        height: non_zero(c.height),
    }
}

fn chat_message_from_proto(msg: proto::WsMsg) -> ChatMessage {
    let sender = msg.sender.unwrap_or_default();
    let direction = if !sender.chat_id.is_empty() && sender.chat_id == msg.recv_id {
        Direction::Outgoing
    } else {
        Direction::Incoming
    };

    ChatMessage {
        msg_id: msg.msg_id,
        sender: MessageSender {
            chat_id: sender.chat_id,
            chat_type: sender.chat_type,
            name: sender.name,
            avatar_url: non_empty(sender.avatar_url),
            tag_old: sender.tag_old,
            tags: sender
                .tag
                .into_iter()
                .map(|t| MessageTag {
                    id: t.id,
                    text: t.text,
                    color: t.color,
                })
                .collect(),
        },
        chat_id: msg.chat_id,
        chat_type: msg.chat_type,
        recv_id: msg.recv_id,
        content_type: msg.content_type,
        content: content_from_proto(msg.content.unwrap_or_default()),
        send_time: msg.timestamp,
        cmd: msg.cmd.map(|c| MessageCmd {
            id: c.id,
            name: c.name,
        }),
        quote_msg_id: non_empty(msg.quote_msg_id),
        edit_time: non_zero(msg.edit_time),
        delete_time: non_zero(msg.delete_time),
        msg_seq: msg.msg_seq,
        direction,
    }
}

// ── Outbound ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Outgoing<'a, T: Serialize> {
    seq: String,
    cmd: &'a str,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginData<'a> {
    user_id: &'a str,
    token: &'a str,
    platform: &'a str,
    device_id: &'a str,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftData<'a> {
    chat_id: &'a str,
    chat_type: i32,
    input: &'a str,
    device_id: &'a str,
}

/// Fresh correlation token: a v4 UUID as 32 lowercase hex digits.
pub fn new_seq() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn encode<T: Serialize>(cmd: &str, data: T) -> Result<Vec<u8>, CodecError> {
    let frame = Outgoing {
        seq: new_seq(),
        cmd,
        data,
    };
    Ok(serde_json::to_vec(&frame)?)
}

pub fn encode_login(
    user_id: &str,
    token: &str,
    platform: &str,
    device_id: &str,
) -> Result<Vec<u8>, CodecError> {
    encode(
        CMD_LOGIN,
        LoginData {
            user_id,
            token,
            platform,
            device_id,
        },
    )
}

pub fn encode_heartbeat() -> Result<Vec<u8>, CodecError> {
    encode(CMD_HEARTBEAT, Empty {})
}

pub fn encode_draft_input(
    chat_id: &str,
    chat_type: i32,
    text: &str,
    device_id: &str,
) -> Result<Vec<u8>, CodecError> {
    encode(
        CMD_DRAFT_INPUT,
        DraftData {
            chat_id,
            chat_type,
            input: text,
            device_id,
        },
    )
}
