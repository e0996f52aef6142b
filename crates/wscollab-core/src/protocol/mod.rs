//! Protocol modules.
//!
//! - `envelope`: the JSON envelope exchanged over text frames.
//! - `classify`: untrusted inbound text => exactly one `Classification`.
//! - `outbound`: validated envelope construction for sends.
//!
//! Inbound parsing is panic-free and never returns an error; frames the
//! protocol cannot understand are surfaced as `Classification::NonProtocol`.

pub mod classify;
pub mod envelope;
pub mod outbound;

pub use classify::{classify, Classification, OtherReason};
pub use envelope::{
    Envelope, Recipients, TextDataPayload, ALL_RECIPIENTS, MESSAGE_TYPE_DATA, MESSAGE_TYPE_TEXT,
    PROTOCOL_VERSION,
};
