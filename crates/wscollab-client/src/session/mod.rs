//! Session lifecycle: connection state, reconnect policy, and the
//! background receive loop.

pub mod reconnect;
pub mod state;
pub(crate) mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::transport::FrameSink;

pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;

/// Write half of the live transport. `None` while disconnected or reconnecting.
/// The mutex is the single exclusion point between concurrent senders.
pub(crate) type SharedSink = Arc<Mutex<Option<Box<dyn FrameSink>>>>;

/// Lifecycle notifications delivered on the connection-event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A reconnect attempt is scheduled after `delay`. `attempt` starts at 0.
    Reconnecting { attempt: u32, delay: Duration },
    /// The transport was re-established; the attempt counter is reset.
    Reconnected,
    /// Retry cap reached; the session is over until `connect` is called again.
    ReconnectExhausted { attempts: u32 },
    /// The server completed a close handshake; the session is over.
    ClosedByServer,
}
