//! wsCollab client library entry.
//!
//! This crate wires the transport, the reconnecting receive loop, and the
//! listener dispatcher into `CollabClient`. It is consumed by the demo binary
//! (`main.rs`) and by integration tests.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod session;
pub mod transport;

pub use client::CollabClient;
pub use dispatch::{ListenerChannel, ListenerError, ListenerResult};
pub use session::{ConnectionEvent, ConnectionState, ReconnectPolicy};
