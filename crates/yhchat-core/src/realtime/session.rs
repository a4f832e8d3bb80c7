//! Connection session: one logical link to the realtime backend.
//!
//! Lifecycle per attempt: `Connecting` → open → send login → `Connected`
//! (heartbeat + ordered receive loop) → `Disconnected` on close or
//! `Error(reason)` on failure. While a reconnect is wanted, the session
//! waits a fixed delay and starts the next attempt with the same user id,
//! platform and device id, re-reading the token.
//!
//! Every `connect`/`disconnect` bumps an epoch. A driver task only touches
//! shared state while its epoch is current, so a cancelled driver winding
//! down can never overwrite the state of its successor.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec;
use super::heartbeat::run_heartbeat_loop;
use super::router::{self, EventBus, MessageEvent, Routed};
use super::transport::{Connector, Inbound};
use crate::config::RealtimeConfig;
use crate::error::SessionError;

const STATE_CHANNEL_CAPACITY: usize = 32;
const UNAUTHENTICATED: &str = "unauthenticated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

// ── Token providers ─────────────────────────────────────────────────────────

/// Source of the bearer token sent in the login frame.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Option<String>;
}

/// Fixed token, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider(Option<String>);

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from a file on every call, so a token refreshed on disk
/// is picked up by the next reconnect.
#[derive(Debug, Clone)]
pub struct FileTokenProvider {
    path: PathBuf,
}

impl FileTokenProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn token(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "Token file unreadable");
                None
            }
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub device_id: String,
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
    pub event_buffer: usize,
}

impl SessionConfig {
    /// Build from the `[realtime]` config table. A missing device id is
    /// replaced by a random one for the lifetime of this session.
    pub fn from_realtime(realtime: &RealtimeConfig) -> Self {
        Self {
            url: realtime.ws_url.clone(),
            device_id: realtime
                .device_id
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(codec::new_seq),
            heartbeat_interval: realtime.heartbeat_interval(),
            reconnect_delay: realtime.reconnect_delay(),
            event_buffer: realtime.event_buffer(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_realtime(&RealtimeConfig::default())
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    user_id: String,
    platform: String,
}

struct Control {
    state: ConnectionState,
    epoch: u64,
    should_reconnect: bool,
    /// A driver task for the current epoch is alive.
    running: bool,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

struct Inner {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    events: EventBus,
    state_tx: broadcast::Sender<ConnectionState>,
    control: Mutex<Control>,
}

/// Handle to the realtime connection. Cheap to clone; all clones drive the
/// same link.
#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<Inner>,
}

enum LinkEnd {
    Closed,
    Failed(String),
    Cancelled,
}

impl ConnectionSession {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let events = EventBus::new(config.event_buffer);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                tokens,
                events,
                state_tx,
                control: Mutex::new(Control {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    should_reconnect: false,
                    running: false,
                    cancel: None,
                    outbound: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state.clone()
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MessageEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn device_id(&self) -> &str {
        &self.inner.config.device_id
    }

    /// Start connecting. Returns once the attempt is under way; progress is
    /// reported through [`subscribe_state`](Self::subscribe_state).
    ///
    /// No-op while connected or while a previous attempt is still running.
    pub async fn connect(&self, user_id: &str, platform: &str) -> Result<(), SessionError> {
        {
            let control = self.inner.lock();
            if control.running || control.state == ConnectionState::Connected {
                debug!(state = %control.state, "connect ignored; session already active");
                return Ok(());
            }
        }

        let Some(token) = self.inner.tokens.token().await else {
            warn!("No auth token available; not connecting");
            let mut control = self.inner.lock();
            self.inner
                .set_state(&mut control, ConnectionState::Error(UNAUTHENTICATED.into()));
            return Err(SessionError::Unauthenticated);
        };

        let (epoch, cancel) = {
            let mut control = self.inner.lock();
            if control.running {
                return Ok(());
            }
            control.epoch += 1;
            control.running = true;
            control.should_reconnect = true;
            let cancel = CancellationToken::new();
            control.cancel = Some(cancel.clone());
            (control.epoch, cancel)
        };

        let credentials = Credentials {
            user_id: user_id.to_string(),
            platform: platform.to_string(),
        };
        info!(user_id, platform, url = %self.inner.config.url, "Connecting to realtime backend");
        tokio::spawn(drive(self.inner.clone(), epoch, cancel, credentials, token));
        Ok(())
    }

    /// Stop the session and any pending reconnect. Idempotent.
    ///
    /// Frames still queued for sending are dropped.
    pub fn disconnect(&self) {
        let mut control = self.inner.lock();
        control.should_reconnect = false;
        control.epoch += 1;
        control.running = false;
        control.outbound = None;
        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
            info!("Disconnecting from realtime backend");
        }
        self.inner
            .set_state(&mut control, ConnectionState::Disconnected);
    }

    /// Tell the account's other devices about the draft in a chat.
    pub fn send_draft_input(
        &self,
        chat_id: &str,
        chat_type: i32,
        text: &str,
    ) -> Result<(), SessionError> {
        let outbound = {
            let control = self.inner.lock();
            if control.state != ConnectionState::Connected {
                return Err(SessionError::NotConnected);
            }
            control.outbound.clone().ok_or(SessionError::NotConnected)?
        };
        let frame = codec::encode_draft_input(chat_id, chat_type, text, &self.inner.config.device_id)?;
        outbound
            .send(frame)
            .map_err(|_| SessionError::NotConnected)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Control> {
        // The guarded data stays consistent even if a holder panicked.
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, control: &mut Control, state: ConnectionState) {
        if control.state == state {
            return;
        }
        debug!(from = %control.state, to = %state, "Connection state changed");
        control.state = state.clone();
        // Ignore send errors (no subscribers)
        let _ = self.state_tx.send(state);
    }

    /// Apply `state` only while `epoch` is current.
    fn transition(&self, epoch: u64, state: ConnectionState) -> bool {
        let mut control = self.lock();
        if control.epoch != epoch {
            return false;
        }
        self.set_state(&mut control, state);
        true
    }

    fn attach(&self, epoch: u64, outbound: mpsc::UnboundedSender<Vec<u8>>) -> bool {
        let mut control = self.lock();
        if control.epoch != epoch {
            return false;
        }
        control.outbound = Some(outbound);
        self.set_state(&mut control, ConnectionState::Connected);
        true
    }

    fn detach(&self, epoch: u64) {
        let mut control = self.lock();
        if control.epoch == epoch {
            control.outbound = None;
        }
    }

    fn should_reconnect(&self, epoch: u64) -> bool {
        let control = self.lock();
        control.epoch == epoch && control.should_reconnect
    }

    fn finish(&self, epoch: u64) {
        let mut control = self.lock();
        if control.epoch == epoch {
            control.running = false;
            control.cancel = None;
            control.outbound = None;
        }
    }

    fn dispatch(&self, bytes: &[u8]) {
        let frame = match codec::decode(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, len = bytes.len(), "Dropping undecodable frame");
                return;
            }
        };
        match router::route(frame) {
            Routed::Event(event) => {
                debug!(kind = event.kind(), "Publishing event");
                self.events.publish(event);
            }
            Routed::Unhandled { cmd, seq } => {
                debug!(cmd = %cmd, seq = %seq, "Frame not routed");
            }
        }
    }
}

async fn drive(
    inner: Arc<Inner>,
    epoch: u64,
    cancel: CancellationToken,
    credentials: Credentials,
    mut token: String,
) {
    loop {
        match run_link(&inner, epoch, &cancel, &credentials, &token).await {
            LinkEnd::Cancelled => break,
            LinkEnd::Closed => {
                info!("Realtime connection closed");
                inner.transition(epoch, ConnectionState::Disconnected);
            }
            LinkEnd::Failed(reason) => {
                warn!(reason = %reason, "Realtime connection failed");
                inner.transition(epoch, ConnectionState::Error(reason));
            }
        }

        if !inner.should_reconnect(epoch) {
            break;
        }

        let delay = inner.config.reconnect_delay;
        info!(delay_secs = delay.as_secs_f64(), "Reconnecting after delay");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        match inner.tokens.token().await {
            Some(fresh) => token = fresh,
            None => {
                warn!("Auth token gone; giving up on reconnect");
                inner.transition(epoch, ConnectionState::Error(UNAUTHENTICATED.into()));
                break;
            }
        }
    }

    inner.finish(epoch);
}

async fn run_link(
    inner: &Inner,
    epoch: u64,
    cancel: &CancellationToken,
    credentials: &Credentials,
    token: &str,
) -> LinkEnd {
    if !inner.transition(epoch, ConnectionState::Connecting) {
        return LinkEnd::Cancelled;
    }

    let opened = tokio::select! {
        _ = cancel.cancelled() => return LinkEnd::Cancelled,
        opened = inner.connector.open(&inner.config.url) => opened,
    };
    let (mut sink, mut source) = match opened {
        Ok(link) => link,
        Err(err) => return LinkEnd::Failed(err.to_string()),
    };

    let login = match codec::encode_login(
        &credentials.user_id,
        token,
        &credentials.platform,
        &inner.config.device_id,
    ) {
        Ok(frame) => frame,
        Err(err) => return LinkEnd::Failed(err.to_string()),
    };
    if let Err(err) = sink.send(login).await {
        return LinkEnd::Failed(err.to_string());
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    if !inner.attach(epoch, outbound_tx.clone()) {
        sink.close().await;
        return LinkEnd::Cancelled;
    }
    info!(user_id = %credentials.user_id, "Realtime connection established");

    let link_cancel = cancel.child_token();
    tokio::spawn(run_heartbeat_loop(
        outbound_tx,
        inner.config.heartbeat_interval,
        link_cancel.clone(),
    ));

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                sink.close().await;
                break LinkEnd::Cancelled;
            }
            Some(frame) = outbound_rx.recv() => {
                if let Err(err) = sink.send(frame).await {
                    break LinkEnd::Failed(err.to_string());
                }
            }
            inbound = source.next() => match inbound {
                Some(Ok(Inbound::Binary(bytes))) => inner.dispatch(&bytes),
                Some(Ok(Inbound::Text(text))) => {
                    debug!(len = text.len(), "Ignoring text frame");
                }
                Some(Ok(Inbound::Closed { code, reason })) => {
                    debug!(code, reason = %reason, "Server closed the link");
                    break LinkEnd::Closed;
                }
                Some(Err(err)) => break LinkEnd::Failed(err.to_string()),
                None => break LinkEnd::Closed,
            },
        }
    };

    link_cancel.cancel();
    inner.detach(epoch);
    end
}
