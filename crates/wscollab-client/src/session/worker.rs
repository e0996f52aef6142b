//! Background receive loop (one per session).
//!
//! Loop:
//! - read the next transport event, racing the shutdown signal
//! - text frames go to the dispatcher, in wire order
//! - a clean server close ends the session
//! - an unclean close or transport error enters the reconnect state machine
//!
//! The loop exits promptly when the shutdown sender fires or is dropped,
//! including while a backoff delay or reconnect attempt is pending.

use std::sync::Arc;

use tokio::sync::oneshot;

use wscollab_core::error::WsCollabError;

use super::state::SessionState;
use super::{ConnectionEvent, ReconnectPolicy, SharedSink};
use crate::dispatch::Dispatcher;
use crate::transport::{ConnectTarget, Connector, FrameStream, TransportEvent};

pub(crate) struct ReceiveLoop {
    pub generation: u64,
    pub target: ConnectTarget,
    pub policy: ReconnectPolicy,
    pub state: Arc<SessionState>,
    pub sink: SharedSink,
    pub dispatcher: Arc<Dispatcher>,
    pub connector: Arc<dyn Connector>,
}

impl ReceiveLoop {
    pub async fn run(self, mut stream: Box<dyn FrameStream>, mut shutdown: oneshot::Receiver<()>) {
        let channel = self.target.channel_id().to_string();
        let user = self.target.user().to_string();

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::debug!(%channel, "receive loop cancelled");
                    return;
                }
                ev = stream.next_event() => ev,
            };

            match event {
                TransportEvent::Text(frame) => {
                    let classified = self.dispatcher.route(&frame, &user);
                    tracing::trace!(%channel, kind = classified.kind(), "frame dispatched");
                    continue;
                }
                TransportEvent::Closed { clean: true } => {
                    tracing::info!(%channel, "server closed the connection");
                    if self.state.end(self.generation) {
                        self.sink.lock().await.take();
                        self.dispatcher.notify(&ConnectionEvent::ClosedByServer);
                    }
                    return;
                }
                TransportEvent::Closed { clean: false } => {
                    tracing::warn!(%channel, "connection lost, trying reconnect");
                }
                TransportEvent::Error(error) => {
                    tracing::warn!(%channel, %error, "transport error, trying reconnect");
                }
            }

            match self.reconnect(&mut shutdown).await {
                Some(next) => stream = next,
                None => return,
            }
        }
    }

    /// Returns the new stream, or `None` when the session is over
    /// (cancelled, superseded, or retries exhausted).
    async fn reconnect(
        &self,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Option<Box<dyn FrameStream>> {
        let channel = self.target.channel_id();

        // Senders fail fast with NotConnected from here on.
        if !self.state.mark_reconnecting(self.generation) {
            return None;
        }
        self.sink.lock().await.take();

        let mut attempt = 0u32;
        loop {
            let Some(delay) = self.policy.delay_for(attempt) else {
                let err = WsCollabError::ReconnectExhausted { attempts: attempt };
                tracing::error!(%channel, error = %err, "could not reconnect to the collab server");
                if self.state.end(self.generation) {
                    self.dispatcher
                        .notify(&ConnectionEvent::ReconnectExhausted { attempts: attempt });
                }
                return None;
            };

            tracing::info!(
                %channel,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );
            self.dispatcher
                .notify(&ConnectionEvent::Reconnecting { attempt, delay });

            tokio::select! {
                biased;
                _ = &mut *shutdown => {
                    tracing::debug!(%channel, "pending reconnect cancelled");
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = &mut *shutdown => return None,
                r = self.connector.connect(&self.target) => r,
            };

            match result {
                Ok((mut sink, stream)) => {
                    let mut slot = self.sink.lock().await;
                    if !self.state.mark_connected(self.generation) {
                        // lost the race with disconnect()
                        drop(slot);
                        if let Err(error) = sink.close().await {
                            tracing::debug!(%channel, %error, "close handshake failed");
                        }
                        return None;
                    }
                    *slot = Some(sink);
                    drop(slot);

                    tracing::info!(%channel, attempt, "reconnected");
                    self.dispatcher.notify(&ConnectionEvent::Reconnected);
                    return Some(stream);
                }
                Err(error) => {
                    tracing::warn!(%channel, attempt, %error, "reconnect attempt failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use wscollab_core::error::Result;

    use super::*;
    use crate::transport::{FrameSink, IntoServerUrl, TransportPair};

    struct FlagSink(Arc<AtomicBool>);

    #[async_trait]
    impl FrameSink for FlagSink {
        async fn send_text(&mut self, _text: String) -> Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct IdleStream;

    #[async_trait]
    impl FrameStream for IdleStream {
        async fn next_event(&mut self) -> TransportEvent {
            std::future::pending().await
        }
    }

    /// Ends the session while the dial is in flight, as a concurrent
    /// `disconnect()` would.
    struct DisconnectDuringDial {
        state: Arc<SessionState>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for DisconnectDuringDial {
        async fn connect(&self, _target: &ConnectTarget) -> Result<TransportPair> {
            self.state.clear();
            Ok((
                Box::new(FlagSink(self.closed.clone())),
                Box::new(IdleStream),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_that_loses_to_disconnect_closes_new_socket() {
        let target =
            ConnectTarget::build("ws://h".into_server_url().unwrap(), "room1", "alice", "pw")
                .unwrap();
        let state = Arc::new(SessionState::new());
        let generation = state.begin(&target).unwrap();
        assert!(state.mark_connected(generation));

        let closed = Arc::new(AtomicBool::new(false));
        let sink: SharedSink = Arc::new(Mutex::new(None));
        let worker = ReceiveLoop {
            generation,
            target,
            policy: ReconnectPolicy::new(1, Duration::from_millis(10)),
            state: state.clone(),
            sink: sink.clone(),
            dispatcher: Arc::new(Dispatcher::new()),
            connector: Arc::new(DisconnectDuringDial {
                state: state.clone(),
                closed: closed.clone(),
            }),
        };

        let (_shutdown_tx, mut shutdown_rx) = oneshot::channel();
        assert!(worker.reconnect(&mut shutdown_rx).await.is_none());

        assert!(closed.load(Ordering::SeqCst));
        assert!(sink.lock().await.is_none());
        assert!(!state.is_connected());
    }
}
