//! Socket abstraction under the connection session.
//!
//! The session only needs three things from a transport: open a duplex link,
//! push text frames out, and pull binary frames in. [`WsConnector`] is the
//! real WebSocket implementation; [`LoopbackConnector`] keeps both ends
//! in-process.

mod loopback;
mod ws;

pub use loopback::{LoopbackConnector, LoopbackPeer};
pub use ws::WsConnector;

use async_trait::async_trait;

use crate::error::TransportError;

/// One inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Binary(Vec<u8>),
    Text(String),
    /// The remote end closed the link.
    Closed { code: u16, reason: String },
}

/// Write half of an open link.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame. `frame` must be UTF-8.
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Best-effort close; errors are ignored.
    async fn close(&mut self);
}

/// Read half of an open link.
#[async_trait]
pub trait FrameSource: Send {
    /// Next inbound event, or `None` once the link is gone.
    async fn next(&mut self) -> Option<Result<Inbound, TransportError>>;
}

pub type Link = (Box<dyn FrameSink>, Box<dyn FrameSource>);

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Link, TransportError>;
}
