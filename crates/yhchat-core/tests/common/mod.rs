//! Frame builders and polling helpers shared by the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use prost::Message as _;
use yhchat_core::realtime::proto;

pub fn info(cmd: &str, seq: &str) -> Option<proto::Info> {
    Some(proto::Info {
        seq: seq.into(),
        cmd: cmd.into(),
    })
}

/// A text message in group `chat_id` from user `u-9`, delivered to `me`.
pub fn group_text(msg_id: &str, chat_id: &str, text: &str, me: &str) -> proto::WsMsg {
    proto::WsMsg {
        msg_id: msg_id.into(),
        sender: Some(proto::Sender {
            chat_id: "u-9".into(),
            chat_type: 1,
            name: "Alice".into(),
            ..Default::default()
        }),
        recv_id: me.into(),
        chat_id: chat_id.into(),
        chat_type: 2,
        content: Some(proto::Content {
            text: text.into(),
            ..Default::default()
        }),
        content_type: 1,
        timestamp: 1_700_000_000_000,
        msg_seq: 1,
        ..Default::default()
    }
}

pub fn push_frame(seq: &str, msg: proto::WsMsg) -> Vec<u8> {
    message_frame("push_message", seq, msg)
}

pub fn edit_frame(seq: &str, msg: proto::WsMsg) -> Vec<u8> {
    message_frame("edit_message", seq, msg)
}

fn message_frame(cmd: &str, seq: &str, msg: proto::WsMsg) -> Vec<u8> {
    proto::PushMessage {
        info: info(cmd, seq),
        data: Some(proto::MsgData {
            any: String::new(),
            msg: Some(msg),
        }),
    }
    .encode_to_vec()
}

pub fn ack_frame(cmd: &str, seq: &str) -> Vec<u8> {
    proto::Envelope {
        info: info(cmd, seq),
    }
    .encode_to_vec()
}

/// Poll `check` until it holds or a few seconds pass.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
