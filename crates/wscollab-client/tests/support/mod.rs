//! In-memory transport used by the client integration tests.
//!
//! `ScriptedConnector` accepts or refuses connections according to a script
//! and hands every accepted connection to the test as a `Peer`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wscollab_client::transport::{
    ConnectTarget, Connector, FrameSink, FrameStream, TransportEvent, TransportPair,
};
use wscollab_client::config::ClientConfig;
use wscollab_client::CollabClient;
use wscollab_core::error::{Result, WsCollabError};

pub const URL: &str = "ws://collab.test";

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Accept,
    Refuse,
}

pub struct ScriptedConnector {
    attempts: AtomicU32,
    script: Mutex<VecDeque<Outcome>>,
    targets: Mutex<Vec<String>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ScriptedConnector {
    pub fn new(script: &[Outcome]) -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let c = Arc::new(Self {
            attempts: AtomicU32::new(0),
            script: Mutex::new(script.iter().copied().collect()),
            targets: Mutex::new(Vec::new()),
            peers: tx,
        });
        (c, rx)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<TransportPair> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.targets
            .lock()
            .unwrap()
            .push(target.server_url().to_string());

        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            Some(Outcome::Accept) => {}
            Some(Outcome::Refuse) | None => {
                return Err(WsCollabError::Connection("connection refused".into()))
            }
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let _ = self.peers.send(Peer {
            to_client,
            from_client,
        });
        Ok((
            Box::new(MockSink { tx: outbound }),
            Box::new(MockStream { rx: inbound }),
        ))
    }
}

struct MockSink {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.tx
            .send(text)
            .map_err(|_| WsCollabError::Connection("peer gone".into()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_event(&mut self) -> TransportEvent {
        self.rx
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed { clean: false })
    }
}

/// Server side of one accepted in-memory connection.
pub struct Peer {
    pub to_client: mpsc::UnboundedSender<TransportEvent>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    pub fn push(&self, frame: &str) {
        self.to_client
            .send(TransportEvent::Text(frame.to_string()))
            .unwrap();
    }

    pub fn drop_connection(&self) {
        self.to_client
            .send(TransportEvent::Closed { clean: false })
            .unwrap();
    }

    pub fn close_cleanly(&self) {
        self.to_client
            .send(TransportEvent::Closed { clean: true })
            .unwrap();
    }

    pub async fn next_sent(&mut self) -> serde_json::Value {
        let raw = within(self.from_client.recv()).await.expect("client sent nothing");
        serde_json::from_str(&raw).unwrap()
    }
}

pub fn client_with(connector: Arc<ScriptedConnector>) -> CollabClient {
    CollabClient::with_connector(ClientConfig::default(), connector)
}

/// Await `fut` for at most 120s (virtual time under a paused clock).
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(120), fut)
        .await
        .expect("timed out")
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<Peer>) -> Peer {
    within(peers.recv()).await.expect("connector dropped")
}

pub fn envelope(msg_type: &str, from: &str, to: &[&str], payload: serde_json::Value) -> String {
    serde_json::json!({
        "version": 1,
        "type": msg_type,
        "from": from,
        "to": to,
        "payload": payload,
    })
    .to_string()
}
