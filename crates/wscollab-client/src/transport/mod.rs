//! Transport layer (WebSocket).
//!
//! The client talks to the socket only through the `Connector` /
//! `FrameSink` / `FrameStream` seam so the receive loop and reconnect logic
//! can run against any duplex text channel. `ws` is the production
//! implementation; `address` builds the credential-bearing connection target.

pub mod address;
pub mod ws;

use async_trait::async_trait;

use wscollab_core::error::Result;

pub use address::{ConnectTarget, IntoServerUrl};
pub use ws::WsConnector;

/// One observation from the receive side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame (binary frames are decoded as lossy UTF-8).
    Text(String),
    /// The peer closed the socket. `clean` is false when the stream ended
    /// without a close handshake.
    Closed { clean: bool },
    /// Transport-level failure; treated as connection loss.
    Error(String),
}

/// Write half of an open transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an open transport.
///
/// `next_event` must be cancel-safe: the receive loop races it against the
/// shutdown signal.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_event(&mut self) -> TransportEvent;
}

/// Both halves of a freshly opened transport.
pub type TransportPair = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Opens transports. Called once by `connect` and again for every reconnect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> Result<TransportPair>;
}
