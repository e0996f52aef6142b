//! Public client surface.
//!
//! `CollabClient` owns the transport handle, the listener registries and the
//! background receive task. Nothing is shared between client instances.
//!
//! Scheduling:
//! - the receive task is the only invoker of listeners
//! - senders go through one async mutex around the write half
//! - `disconnect` clears state first, then cancels and awaits the receive
//!   task, then closes the socket

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use wscollab_core::error::{Result, WsCollabError};
use wscollab_core::protocol::outbound;
use wscollab_core::protocol::{
    Envelope, OtherReason, Recipients, TextDataPayload, MESSAGE_TYPE_DATA, MESSAGE_TYPE_TEXT,
};

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, ListenerResult};
use crate::session::state::SessionState;
use crate::session::worker::ReceiveLoop;
use crate::session::{ConnectionEvent, ConnectionState, ReconnectPolicy, SharedSink};
use crate::transport::{ConnectTarget, Connector, IntoServerUrl, WsConnector};

struct ReceiveTask {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Client for one collab channel at a time.
pub struct CollabClient {
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    state: Arc<SessionState>,
    sink: SharedSink,
    dispatcher: Arc<Dispatcher>,
    task: Mutex<Option<ReceiveTask>>,
}

impl CollabClient {
    /// Client over the WebSocket transport.
    pub fn new(cfg: ClientConfig) -> Self {
        let connector = Arc::new(WsConnector::new(&cfg.transport));
        Self::with_connector(cfg, connector)
    }

    /// Client over a custom transport.
    pub fn with_connector(cfg: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            policy: ReconnectPolicy::from(&cfg.reconnect),
            connector,
            state: Arc::new(SessionState::new()),
            sink: Arc::new(Mutex::new(None)),
            dispatcher: Arc::new(Dispatcher::new()),
            task: Mutex::new(None),
        }
    }

    // --------------------
    // Lifecycle
    // --------------------

    /// Connect to `url` and join `channel_id`.
    ///
    /// Fails with `Connection` for a malformed address, rejected credentials,
    /// an unreachable server, or when a session is already live. Not retried.
    pub async fn connect(
        &self,
        url: impl IntoServerUrl,
        channel_id: &str,
        user: &str,
        password: &str,
    ) -> Result<()> {
        let target = ConnectTarget::build(url.into_server_url()?, channel_id, user, password)?;

        let mut task = self.task.lock().await;
        let generation = self.state.begin(&target)?;

        // A session that ended on its own (server close, exhausted retries)
        // leaves a finished task behind.
        if let Some(old) = task.take() {
            let _ = old.shutdown.send(());
            let _ = old.join.await;
        }

        tracing::info!(url = %target.redacted_url(), channel = %channel_id, %user, "connecting");

        let (sink, stream) = match self.connector.connect(&target).await {
            Ok(pair) => pair,
            Err(e) => {
                self.state.end(generation);
                tracing::warn!(channel = %channel_id, error = %e, "connect failed");
                return Err(e);
            }
        };

        {
            let mut slot = self.sink.lock().await;
            if !self.state.mark_connected(generation) {
                drop(slot);
                let mut sink = sink;
                let _ = sink.close().await;
                return Err(WsCollabError::Connection(
                    "disconnected while connecting".into(),
                ));
            }
            *slot = Some(sink);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let receive = ReceiveLoop {
            generation,
            target,
            policy: self.policy,
            state: Arc::clone(&self.state),
            sink: Arc::clone(&self.sink),
            dispatcher: Arc::clone(&self.dispatcher),
            connector: Arc::clone(&self.connector),
        };
        let join = tokio::spawn(receive.run(stream, shutdown_rx));
        *task = Some(ReceiveTask {
            shutdown: shutdown_tx,
            join,
        });

        tracing::info!(channel = %channel_id, "connected");
        Ok(())
    }

    /// Close the session. Idempotent; safe before any `connect`.
    ///
    /// State is cleared before anything is awaited, and the receive task
    /// (including a pending reconnect) has exited when this returns.
    pub async fn disconnect(&self) {
        let was_live = self.state.clear();

        let mut task = self.task.lock().await;
        if let Some(t) = task.take() {
            let _ = t.shutdown.send(());
            if let Err(e) = t.join.await {
                tracing::warn!(error = %e, "receive task ended abnormally");
            }
        }

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "close handshake failed");
            }
        }
        drop(task);

        if was_live {
            tracing::info!("disconnected from collab server");
        }
    }

    // --------------------
    // Outbound
    // --------------------

    /// Send an envelope of any `msg_type` with an object `payload`.
    ///
    /// Arguments are validated first (`InvalidArgument`); then the call fails
    /// fast with `NotConnected` while disconnected or reconnecting. Nothing is
    /// queued.
    pub async fn send(
        &self,
        msg_type: &str,
        payload: Value,
        to: impl Into<Recipients>,
    ) -> Result<()> {
        let to = to.into();
        outbound::validate_send_args(msg_type, &payload, &to)?;

        let user = self
            .state
            .connected_user()
            .ok_or(WsCollabError::NotConnected)?;
        let env = outbound::build_envelope(&user, msg_type, payload, to)?;
        self.transmit(&env).await
    }

    /// Text meant to be answered. `sender_name` is a display name, not the username.
    pub async fn send_text(
        &self,
        sender_name: &str,
        content: &str,
        to: impl Into<Recipients>,
    ) -> Result<()> {
        self.send(
            MESSAGE_TYPE_TEXT,
            TextDataPayload::new(sender_name, content).into_value(),
            to,
        )
        .await
    }

    /// Labelled data, not necessarily answered.
    pub async fn send_data(&self, label: &str, data: &str, to: impl Into<Recipients>) -> Result<()> {
        self.send(
            MESSAGE_TYPE_DATA,
            TextDataPayload::new(label, data).into_value(),
            to,
        )
        .await
    }

    async fn transmit(&self, env: &Envelope) -> Result<()> {
        let text = outbound::encode(env)?;

        let mut slot = self.sink.lock().await;
        let sink = slot.as_mut().ok_or(WsCollabError::NotConnected)?;
        if !self.state.is_connected() {
            return Err(WsCollabError::NotConnected);
        }
        sink.send_text(text).await.map_err(|e| {
            tracing::warn!(error = %e, "failed to send to collab server");
            WsCollabError::NotConnected
        })
    }

    // --------------------
    // Listeners
    // --------------------

    /// Every syntactically valid envelope, including self-sent ones and ones
    /// addressed to others. Runs before the typed listeners.
    pub fn on_all_messages<F>(&self, f: F)
    where
        F: Fn(&Envelope) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.on_all_messages(f);
    }

    /// `(sender_name, content, envelope)` for text addressed to us by someone else.
    pub fn on_text_message<F>(&self, f: F)
    where
        F: Fn(&str, &str, &Envelope) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.on_text_message(f);
    }

    /// `(label, data, envelope)` for data addressed to us by someone else.
    pub fn on_data_message<F>(&self, f: F)
    where
        F: Fn(&str, &str, &Envelope) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.on_data_message(f);
    }

    pub fn on_other_message<F>(&self, f: F)
    where
        F: Fn(&Envelope, OtherReason) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.on_other_message(f);
    }

    pub fn on_non_protocol_message<F>(&self, f: F)
    where
        F: Fn(&str) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.on_non_protocol_message(f);
    }

    pub fn on_connection_event<F>(&self, f: F)
    where
        F: Fn(&ConnectionEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.on_connection_event(f);
    }

    pub fn remove_all_listeners(&self) {
        self.dispatcher.clear();
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // --------------------
    // Status
    // --------------------

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn channel_id(&self) -> String {
        self.state.snapshot().channel_id
    }

    pub fn server_url(&self) -> Option<Url> {
        self.state.snapshot().server_url
    }

    pub fn user(&self) -> String {
        self.state.snapshot().user
    }

    pub fn state(&self) -> ConnectionState {
        self.state.snapshot()
    }
}

impl Default for CollabClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
