//! Error types shared across the realtime pipeline.
//!
//! None of these are fatal to a running session: transport errors feed the
//! reconnect policy, decode errors drop a single frame and store errors are
//! swallowed by the adapter that hit them.

use std::time::Duration;

use thiserror::Error;

/// An incoming binary frame could not be turned into a [`DecodedFrame`].
///
/// [`DecodedFrame`]: crate::realtime::codec::DecodedFrame
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("`{cmd}` frame carries no payload")]
    MissingPayload { cmd: String },
}

/// An outgoing frame could not be serialized.
#[derive(Debug, Error)]
#[error("failed to encode outgoing frame: {0}")]
pub struct CodecError(#[from] pub serde_json::Error);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// No auth token was available when a connection was requested.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
