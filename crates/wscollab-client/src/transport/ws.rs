//! WebSocket transport (tokio-tungstenite).
//!
//! - Handshake carries `Authorization: Basic ...` and is bounded by the
//!   configured connect timeout.
//! - Text and binary frames surface as `TransportEvent::Text`.
//! - Ping/Pong are answered by tungstenite and never reach the router.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use wscollab_core::error::{Result, WsCollabError};

use super::{ConnectTarget, Connector, FrameSink, FrameStream, TransportEvent, TransportPair};
use crate::config::TransportSection;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(cfg: &TransportSection) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(&TransportSection::default())
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<TransportPair> {
        let mut request = target
            .request_url()
            .as_str()
            .into_client_request()
            .map_err(|e| WsCollabError::Connection(format!("invalid request url: {e}")))?;

        let auth = HeaderValue::from_str(target.authorization())
            .map_err(|e| WsCollabError::Connection(format!("invalid credentials: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        tracing::debug!(url = %target.redacted_url(), "opening websocket");

        let socket = match tokio::time::timeout(self.connect_timeout, connect_async(request)).await
        {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => return Err(map_handshake_error(e)),
            Err(_) => {
                return Err(WsCollabError::Connection(format!(
                    "handshake timed out after {}ms",
                    self.connect_timeout.as_millis()
                )))
            }
        };

        let (write, read) = socket.split();
        Ok((Box::new(WsSink { write }), Box::new(WsFrames { read })))
    }
}

fn map_handshake_error(e: WsError) -> WsCollabError {
    match e {
        WsError::Http(resp)
            if resp.status() == StatusCode::UNAUTHORIZED || resp.status() == StatusCode::FORBIDDEN =>
        {
            WsCollabError::Connection(format!("authentication rejected ({})", resp.status()))
        }
        WsError::Http(resp) => {
            WsCollabError::Connection(format!("handshake rejected ({})", resp.status()))
        }
        other => WsCollabError::Connection(format!("websocket connect failed: {other}")),
    }
}

struct WsSink {
    write: SplitSink<Socket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| WsCollabError::Connection(format!("send failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        // Sink::close sends the Close frame and flushes.
        self.write
            .close()
            .await
            .map_err(|e| WsCollabError::Connection(format!("close failed: {e}")))
    }
}

struct WsFrames {
    read: SplitStream<Socket>,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return TransportEvent::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "close frame received");
                    return TransportEvent::Closed { clean: true };
                }
                // Ping/Pong/raw frames: tungstenite handles the replies.
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed)) => {
                    return TransportEvent::Closed { clean: true }
                }
                Some(Err(e)) => return TransportEvent::Error(e.to_string()),
                None => return TransportEvent::Closed { clean: false },
            }
        }
    }
}
