//! Envelope (JSON over text frames).
//!
//! Unknown top-level fields are tolerated on receive so newer peers never
//! break classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WsCollabError};

/// Version written into every outbound envelope.
pub const PROTOCOL_VERSION: u64 = 1;

/// Recipient sentinel addressing every participant of the channel.
pub const ALL_RECIPIENTS: &str = "all";

/// `type` of conversational text envelopes.
pub const MESSAGE_TYPE_TEXT: &str = "message";

/// `type` of opaque data envelopes.
pub const MESSAGE_TYPE_DATA: &str = "data";

/// One protocol-level message unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version.
    pub version: u64,
    /// Message type (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Username of the sending participant (not the display name).
    pub from: String,
    /// Participant ids, or the `"all"` sentinel.
    pub to: Vec<String>,
    /// Structurally unknown payload; validated per `msg_type` by the classifier.
    pub payload: Value,
}

impl Envelope {
    /// True when `to` contains `"all"` or `user`.
    pub fn is_addressed_to(&self, user: &str) -> bool {
        self.to.iter().any(|r| r == ALL_RECIPIENTS || r == user)
    }

    /// True when the envelope targets `user` and was sent by someone else.
    pub fn is_deliverable_to(&self, user: &str) -> bool {
        self.is_addressed_to(user) && self.from != user
    }
}

/// Payload shared by `message` and `data` envelopes.
///
/// `name` is the display name (text) or label (data); `content` is free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDataPayload {
    pub name: String,
    pub content: String,
}

impl TextDataPayload {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// `{"name": .., "content": ..}` as a JSON object.
    pub fn into_value(self) -> Value {
        serde_json::json!({ "name": self.name, "content": self.content })
    }
}

/// Recipient list for outbound envelopes.
///
/// Conversions never fail; emptiness and blank ids are rejected by
/// [`Recipients::validate`] when the envelope is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// `["all"]`.
    pub fn all() -> Self {
        Self(vec![ALL_RECIPIENTS.to_string()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Reject an empty list or blank participant ids.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(WsCollabError::invalid_argument(
                "to",
                "must contain at least one recipient",
            ));
        }
        if let Some(pos) = self.0.iter().position(|r| r.trim().is_empty()) {
            return Err(WsCollabError::invalid_argument(
                "to",
                format!("recipient at index {pos} is blank"),
            ));
        }
        Ok(())
    }
}

impl Default for Recipients {
    fn default() -> Self {
        Self::all()
    }
}

impl From<&str> for Recipients {
    fn from(user: &str) -> Self {
        Self(vec![user.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(user: String) -> Self {
        Self(vec![user])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(users: Vec<String>) -> Self {
        Self(users)
    }
}

impl From<&[&str]> for Recipients {
    fn from(users: &[&str]) -> Self {
        Self(users.iter().map(|u| u.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(users: [&str; N]) -> Self {
        Self(users.iter().map(|u| u.to_string()).collect())
    }
}
