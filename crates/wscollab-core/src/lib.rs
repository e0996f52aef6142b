//! wsCollab core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the envelope wire contract, the inbound frame
//! classifier, and the outbound envelope builder shared by the client and
//! test tooling. It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Untrusted inbound text is never an error: it always lands in a
//! [`protocol::Classification`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, Result, WsCollabError};
