//! Composition root of the realtime pipeline.
//!
//! ```text
//! socket ─▶ session ─▶ codec ─▶ router ─▶ EventBus ─┬─▶ MessageStoreAdapter
//!                                                   └─▶ ConversationAggregator
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::realtime::{
    ConnectionSession, ConnectionState, Connector, MessageEvent, SessionConfig, TokenProvider,
};
use crate::store::{ConversationStore, MessageStore};
use crate::sync::{ConversationAggregator, MessageStoreAdapter};

/// A session plus its two store consumers, running under one cancellation
/// scope.
pub struct RealtimePipeline {
    session: ConnectionSession,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RealtimePipeline {
    /// Build the session and start both consumers. Nothing is connected yet;
    /// call [`connect`](Self::connect).
    ///
    /// Both consumers subscribe before this returns, so they see every event
    /// the session publishes afterwards.
    pub fn start<S>(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
        store: Arc<S>,
        self_user_id: Option<String>,
    ) -> Self
    where
        S: MessageStore + ConversationStore + 'static,
    {
        let session = ConnectionSession::new(config, connector, tokens);
        let cancel = CancellationToken::new();

        let messages: Arc<dyn MessageStore> = store.clone();
        let conversations: Arc<dyn ConversationStore> = store;

        let store_events = session.subscribe_events();
        let summary_events = session.subscribe_events();

        let tasks = vec![
            tokio::spawn(
                MessageStoreAdapter::new(messages.clone()).run(store_events, cancel.child_token()),
            ),
            tokio::spawn(
                ConversationAggregator::new(conversations, messages, self_user_id)
                    .run(summary_events, cancel.child_token()),
            ),
        ];

        Self {
            session,
            cancel,
            tasks,
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub async fn connect(&self, user_id: &str, platform: &str) -> Result<(), SessionError> {
        self.session.connect(user_id, platform).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MessageEvent> {
        self.session.subscribe_events()
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.session.subscribe_state()
    }

    /// Disconnect, stop both consumers and wait for them to finish.
    pub async fn shutdown(self) {
        self.session.disconnect();
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Pipeline task ended abnormally");
            }
        }
        info!("Realtime pipeline stopped");
    }
}
