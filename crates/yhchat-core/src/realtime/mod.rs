//! Realtime link to the Yhchat backend: wire schema, codec, transport,
//! session lifecycle and event routing.

pub mod codec;
mod heartbeat;
pub mod proto;
pub mod router;
pub mod session;
pub mod transport;

pub use codec::DecodedFrame;
pub use router::{EventBus, MessageEvent, Routed, route};
pub use session::{
    ConnectionSession, ConnectionState, FileTokenProvider, SessionConfig, StaticTokenProvider,
    TokenProvider,
};
pub use transport::{Connector, LoopbackConnector, LoopbackPeer, WsConnector};
