//! Dispatcher module exports.
//!
//! Re-exports the listener registry and listener types so downstream
//! consumers can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, ListenerChannel, ListenerError, ListenerResult};
