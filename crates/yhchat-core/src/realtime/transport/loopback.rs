use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use super::{Connector, FrameSink, FrameSource, Inbound, Link};
use crate::error::TransportError;

type InboundTx = mpsc::UnboundedSender<Result<Inbound, TransportError>>;
type InboundRx = mpsc::UnboundedReceiver<Result<Inbound, TransportError>>;

/// In-process connector. Every successful `open` hands the server half of
/// the new link to whoever calls [`LoopbackConnector::accept`].
pub struct LoopbackConnector {
    peers_tx: mpsc::UnboundedSender<LoopbackPeer>,
    peers_rx: Mutex<mpsc::UnboundedReceiver<LoopbackPeer>>,
    opens: AtomicUsize,
    refuse: AtomicBool,
}

impl Default for LoopbackConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackConnector {
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            peers_tx,
            peers_rx: Mutex::new(peers_rx),
            opens: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        }
    }

    /// Wait for the next link the client opens.
    pub async fn accept(&self) -> Option<LoopbackPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Number of `open` calls so far, refused ones included.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// While set, `open` fails with a connect error.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn open(&self, url: &str) -> Result<Link, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!("{url}: connection refused")));
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let peer = LoopbackPeer {
            url: url.to_string(),
            sent: sent_rx,
            inbound: Some(inbound_tx),
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| TransportError::Connect("loopback listener gone".into()))?;

        Ok((
            Box::new(LoopbackSink { tx: Some(sent_tx) }),
            Box::new(LoopbackSource { rx: inbound_rx }),
        ))
    }
}

/// Server half of a loopback link.
#[derive(Debug)]
pub struct LoopbackPeer {
    url: String,
    sent: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: Option<InboundTx>,
}

impl LoopbackPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next frame the client sent; `None` once the client closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.sent.recv().await
    }

    /// Next client frame parsed as JSON. Non-JSON frames are skipped.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        while let Some(frame) = self.recv().await {
            if let Ok(value) = serde_json::from_slice(&frame) {
                return Some(value);
            }
        }
        None
    }

    /// Frame already sent by the client, without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.sent.try_recv().ok()
    }

    /// Deliver a binary frame to the client. `false` once the link is gone.
    pub fn send_binary(&self, frame: Vec<u8>) -> bool {
        self.push(Ok(Inbound::Binary(frame)))
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(Ok(Inbound::Text(text.into())))
    }

    /// Close the link from the server side.
    pub fn close(&mut self, code: u16, reason: &str) {
        self.push(Ok(Inbound::Closed {
            code,
            reason: reason.to_string(),
        }));
        self.inbound = None;
    }

    /// Break the link with a transport error.
    pub fn fail(&mut self, reason: &str) {
        self.push(Err(TransportError::Receive(reason.to_string())));
        self.inbound = None;
    }

    fn push(&self, item: Result<Inbound, TransportError>) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(item).is_ok())
    }
}

struct LoopbackSink {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

#[async_trait]
impl FrameSink for LoopbackSink {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

struct LoopbackSource {
    rx: InboundRx,
}

#[async_trait]
impl FrameSource for LoopbackSource {
    async fn next(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.rx.recv().await
    }
}
