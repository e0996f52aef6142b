//! Inbound frame classifier.
//!
//! Decision order (first match wins):
//! 1. not JSON, or not an object with `version` (positive integer), `type` (string),
//!    `from` (string), `to` (array of strings), `payload` (object)
//!    => `NonProtocol`
//! 2. `message` / `data` with a `{name, content}` string payload => `Text` / `Data`
//! 3. `message` / `data` with any other payload => `Other(MalformedPayload)`
//! 4. any other `type` => `Other(UnknownType)`
//!
//! Every variant except `NonProtocol` carries a syntactically valid envelope,
//! which the router feeds to the all-messages channel before filtering.

use std::num::NonZeroU64;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::envelope::{Envelope, TextDataPayload, MESSAGE_TYPE_DATA, MESSAGE_TYPE_TEXT};

/// Why a well-formed envelope landed in the Other channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherReason {
    /// `type` is neither `message` nor `data`.
    UnknownType,
    /// `type` is `message`/`data` but the payload is not `{name, content}`.
    MalformedPayload,
}

impl OtherReason {
    pub fn as_str(self) -> &'static str {
        match self {
            OtherReason::UnknownType => "unknown_type",
            OtherReason::MalformedPayload => "malformed_payload",
        }
    }
}

/// Result of classifying one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Raw text the protocol cannot parse.
    NonProtocol(String),
    Text {
        envelope: Envelope,
        payload: TextDataPayload,
    },
    Data {
        envelope: Envelope,
        payload: TextDataPayload,
    },
    Other {
        envelope: Envelope,
        reason: OtherReason,
    },
}

impl Classification {
    /// The envelope, for every variant except `NonProtocol`.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Classification::NonProtocol(_) => None,
            Classification::Text { envelope, .. }
            | Classification::Data { envelope, .. }
            | Classification::Other { envelope, .. } => Some(envelope),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::NonProtocol(_) => "non_protocol",
            Classification::Text { .. } => "text",
            Classification::Data { .. } => "data",
            Classification::Other { .. } => "other",
        }
    }
}

/// Top-level shape check. Extra fields are ignored.
///
/// Only deserialized from an already-checked `Value::Object`: the derived
/// impl would also accept a JSON array in field order.
#[derive(Deserialize)]
struct WireEnvelope {
    version: NonZeroU64,
    #[serde(rename = "type")]
    msg_type: String,
    from: String,
    to: Vec<String>,
    payload: Map<String, Value>,
}

/// Classify one raw inbound frame.
pub fn classify(text: &str) -> Classification {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => {
            tracing::trace!("non-protocol frame: not a json object");
            return Classification::NonProtocol(text.to_string());
        }
        Err(e) => {
            tracing::trace!(error = %e, "non-protocol frame");
            return Classification::NonProtocol(text.to_string());
        }
    };
    let wire: WireEnvelope = match serde_json::from_value(value) {
        Ok(w) => w,
        Err(e) => {
            tracing::trace!(error = %e, "non-protocol frame");
            return Classification::NonProtocol(text.to_string());
        }
    };

    let typed = match wire.msg_type.as_str() {
        MESSAGE_TYPE_TEXT | MESSAGE_TYPE_DATA => parse_text_data(&wire.payload),
        _ => None,
    };

    let envelope = Envelope {
        version: wire.version.get(),
        msg_type: wire.msg_type,
        from: wire.from,
        to: wire.to,
        payload: Value::Object(wire.payload),
    };

    match typed {
        Some(payload) if envelope.msg_type == MESSAGE_TYPE_TEXT => {
            Classification::Text { envelope, payload }
        }
        Some(payload) => Classification::Data { envelope, payload },
        None if envelope.msg_type == MESSAGE_TYPE_TEXT || envelope.msg_type == MESSAGE_TYPE_DATA => {
            Classification::Other {
                envelope,
                reason: OtherReason::MalformedPayload,
            }
        }
        None => Classification::Other {
            envelope,
            reason: OtherReason::UnknownType,
        },
    }
}

fn parse_text_data(payload: &Map<String, Value>) -> Option<TextDataPayload> {
    let name = payload.get("name")?.as_str()?;
    let content = payload.get("content")?.as_str()?;
    Some(TextDataPayload::new(name, content))
}
