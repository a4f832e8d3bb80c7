// ── Yhchat Core Library ──────────────────────────────────────────────────────
//
// The realtime half of a Yhchat client: the binary frame codec for the
// backend's WebSocket protocol, the connection session with heartbeat and
// reconnect, the event router and the two downstream consumers (message
// cache and conversation list), plus the configuration, logging and local
// SQLite cache they run on.

pub mod args;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod realtime;
pub mod store;
pub mod sync;

pub use error::{CodecError, DecodeError, SessionError, StoreError, TransportError};
pub use model::{ChatMessage, ConversationKey, ConversationSummary, MessageContent};
pub use pipeline::RealtimePipeline;
pub use realtime::{ConnectionSession, ConnectionState, MessageEvent};
