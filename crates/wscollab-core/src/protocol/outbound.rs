//! Outbound envelope construction.
//!
//! Arguments are validated before anything is serialized so a malformed
//! envelope never reaches the transport.

use serde_json::Value;

use super::envelope::{
    Envelope, Recipients, TextDataPayload, MESSAGE_TYPE_DATA, MESSAGE_TYPE_TEXT, PROTOCOL_VERSION,
};
use crate::error::{Result, WsCollabError};

/// Validate caller-supplied send arguments without needing a sender.
pub fn validate_send_args(msg_type: &str, payload: &Value, to: &Recipients) -> Result<()> {
    if msg_type.trim().is_empty() {
        return Err(WsCollabError::invalid_argument("msg_type", "must not be empty"));
    }
    if !payload.is_object() {
        return Err(WsCollabError::invalid_argument(
            "payload",
            format!("must be a JSON object, got {}", json_kind(payload)),
        ));
    }
    to.validate()
}

/// Build a version-1 envelope sent by `from`.
pub fn build_envelope(
    from: &str,
    msg_type: &str,
    payload: Value,
    to: Recipients,
) -> Result<Envelope> {
    if from.is_empty() {
        return Err(WsCollabError::invalid_argument("user", "must not be empty"));
    }
    validate_send_args(msg_type, &payload, &to)?;

    Ok(Envelope {
        version: PROTOCOL_VERSION,
        msg_type: msg_type.to_string(),
        from: from.to_string(),
        to: to.into_vec(),
        payload,
    })
}

/// `message` envelope with a `{name, content}` payload.
pub fn text_envelope(from: &str, sender_name: &str, content: &str, to: Recipients) -> Result<Envelope> {
    build_envelope(
        from,
        MESSAGE_TYPE_TEXT,
        TextDataPayload::new(sender_name, content).into_value(),
        to,
    )
}

/// `data` envelope; same payload shape as text.
pub fn data_envelope(from: &str, label: &str, data: &str, to: Recipients) -> Result<Envelope> {
    build_envelope(
        from,
        MESSAGE_TYPE_DATA,
        TextDataPayload::new(label, data).into_value(),
        to,
    )
}

/// Serialize for a text frame.
pub fn encode(env: &Envelope) -> Result<String> {
    serde_json::to_string(env)
        .map_err(|e| WsCollabError::Internal(format!("json encode failed: {e}")))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
