//! Shared connection state.
//!
//! Every session gets a generation number. `clear` (disconnect) bumps it, so
//! a receive loop still finishing for an older generation can never flip the
//! client back to connected.

use parking_lot::RwLock;
use url::Url;

use wscollab_core::error::{Result, WsCollabError};

use crate::transport::ConnectTarget;

/// Read-only snapshot exposed to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub channel_id: String,
    /// Credential-bearing server address of the current session.
    pub server_url: Option<Url>,
    pub user: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    generation: u64,
    channel_id: String,
    server_url: Option<Url>,
    user: String,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    inner: RwLock<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                phase: Phase::Idle,
                generation: 0,
                channel_id: String::new(),
                server_url: None,
                user: String::new(),
            }),
        }
    }

    /// Reserve a new session. Fails if one is already live.
    pub fn begin(&self, target: &ConnectTarget) -> Result<u64> {
        let mut s = self.inner.write();
        if s.phase != Phase::Idle {
            return Err(WsCollabError::Connection(
                "already connected; call disconnect first".into(),
            ));
        }
        s.generation += 1;
        s.phase = Phase::Connecting;
        s.channel_id = target.channel_id().to_string();
        s.server_url = Some(target.server_url().clone());
        s.user = target.user().to_string();
        Ok(s.generation)
    }

    pub fn mark_connected(&self, generation: u64) -> bool {
        self.transition(generation, Phase::Connected)
    }

    pub fn mark_reconnecting(&self, generation: u64) -> bool {
        self.transition(generation, Phase::Reconnecting)
    }

    /// End `generation` (failed connect, exhausted reconnect, server close).
    pub fn end(&self, generation: u64) -> bool {
        let mut s = self.inner.write();
        if s.generation != generation || s.phase == Phase::Idle {
            return false;
        }
        reset(&mut s);
        true
    }

    /// Unconditional clear used by `disconnect`. Returns whether a session was live.
    pub fn clear(&self) -> bool {
        let mut s = self.inner.write();
        let was_live = s.phase != Phase::Idle;
        s.generation += 1;
        reset(&mut s);
        was_live
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().phase == Phase::Connected
    }

    /// Local user, if a session is connected right now.
    pub fn connected_user(&self) -> Option<String> {
        let s = self.inner.read();
        (s.phase == Phase::Connected).then(|| s.user.clone())
    }

    pub fn snapshot(&self) -> ConnectionState {
        let s = self.inner.read();
        ConnectionState {
            connected: s.phase == Phase::Connected,
            channel_id: s.channel_id.clone(),
            server_url: s.server_url.clone(),
            user: s.user.clone(),
        }
    }

    fn transition(&self, generation: u64, to: Phase) -> bool {
        let mut s = self.inner.write();
        if s.generation != generation || s.phase == Phase::Idle {
            return false;
        }
        s.phase = to;
        true
    }
}

fn reset(s: &mut Inner) {
    s.phase = Phase::Idle;
    s.channel_id.clear();
    s.server_url = None;
    s.user.clear();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::IntoServerUrl;

    fn target() -> ConnectTarget {
        ConnectTarget::build("ws://h".into_server_url().unwrap(), "room1", "alice", "pw").unwrap()
    }

    #[test]
    fn lifecycle_populates_and_clears() {
        let st = SessionState::new();
        let generation = st.begin(&target()).unwrap();
        assert!(!st.is_connected());
        assert!(st.mark_connected(generation));

        let snap = st.snapshot();
        assert!(snap.connected);
        assert_eq!(snap.channel_id, "room1");
        assert_eq!(snap.user, "alice");

        assert!(st.clear());
        assert_eq!(st.snapshot(), ConnectionState::default());
    }

    #[test]
    fn second_begin_fails_while_live() {
        let st = SessionState::new();
        st.begin(&target()).unwrap();
        let err = st.begin(&target()).unwrap_err();
        assert_eq!(err.code().as_str(), "CONNECTION_ERROR");
    }

    #[test]
    fn stale_generation_cannot_reconnect() {
        let st = SessionState::new();
        let generation = st.begin(&target()).unwrap();
        st.mark_connected(generation);
        st.clear();
        assert!(!st.mark_connected(generation));
        assert!(!st.end(generation));
        assert!(!st.is_connected());
    }

    #[test]
    fn clear_is_idempotent() {
        let st = SessionState::new();
        assert!(!st.clear());
        assert!(!st.clear());
        assert_eq!(st.snapshot(), ConnectionState::default());
    }
}
