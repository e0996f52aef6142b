//! Shared error type across wsCollab crates.

use thiserror::Error;

/// Stable error codes (safe to match on and to log).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Address, auth, or transport-open failure.
    Connection,
    /// Send attempted while the transport is not open.
    NotConnected,
    /// Caller-supplied send parameters violate the envelope contract.
    InvalidArgument,
    /// Background reconnect gave up.
    ReconnectExhausted,
    /// A registered listener failed during dispatch.
    ObserverFailure,
    /// Invalid client configuration.
    BadConfig,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Connection => "CONNECTION_ERROR",
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::ReconnectExhausted => "RECONNECT_EXHAUSTED",
            ErrorCode::ObserverFailure => "OBSERVER_FAILURE",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Whether retrying the same call later can succeed without changing it.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::NotConnected)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WsCollabError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum WsCollabError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("not connected")]
    NotConnected,
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
    #[error("{channel} listener failed: {reason}")]
    ObserverFailure { channel: &'static str, reason: String },
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl WsCollabError {
    /// Shorthand for an [`WsCollabError::InvalidArgument`].
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        WsCollabError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            WsCollabError::Connection(_) => ErrorCode::Connection,
            WsCollabError::NotConnected => ErrorCode::NotConnected,
            WsCollabError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            WsCollabError::ReconnectExhausted { .. } => ErrorCode::ReconnectExhausted,
            WsCollabError::ObserverFailure { .. } => ErrorCode::ObserverFailure,
            WsCollabError::Config(_) => ErrorCode::BadConfig,
            WsCollabError::Internal(_) => ErrorCode::Internal,
        }
    }
}
