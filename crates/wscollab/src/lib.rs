//! Top-level facade crate for wscollab.
//!
//! Re-exports the protocol types and the client so users can depend on a single crate.

pub mod core {
    pub use wscollab_core::*;
}

pub mod client {
    pub use wscollab_client::*;
}

pub use wscollab_client::{CollabClient, ConnectionEvent, ConnectionState, ListenerResult};
pub use wscollab_core::protocol::{Classification, Envelope, OtherReason, Recipients};
pub use wscollab_core::{ErrorCode, Result, WsCollabError};
