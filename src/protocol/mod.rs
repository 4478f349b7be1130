//! # Protocol Module
//!
//! The message-passing contract with the transport: connection scopes and
//! inbound events arrive as [`Value`] mappings, responses leave as
//! [`Outbound`] messages through a [`Sender`].
//!
//! A malformed scope or event is a [`ProtocolError`]. These are framework
//! errors, reported to the caller rather than turned into 4xx/5xx responses.

mod message;
mod scope;

pub use message::{Header, Headers, Outbound, Payload, Receiver, Sender};
pub use scope::{RequestHeaders, Scope, ScopeKind, MAX_INLINE_HEADERS};

pub(crate) use scope::required;

use crate::value::Value;
use std::fmt;

/// Violation of the transport contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required key is absent from the scope or event.
    MissingKey(&'static str),
    /// A key is present with the wrong shape.
    BadMessage(String),
    /// The event type is not what the current stage expects.
    UnexpectedMessage { expected: &'static str, got: String },
    /// The scope `type` is not lifespan, http or websocket.
    UnknownScope(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MissingKey(key) => write!(f, "ASGI scope is missing '{key}'"),
            ProtocolError::BadMessage(detail) => write!(f, "bad ASGI message: {detail}"),
            ProtocolError::UnexpectedMessage { expected, got } => {
                write!(f, "expected ASGI message '{expected}', got '{got}'")
            }
            ProtocolError::UnknownScope(kind) => write!(f, "unknown ASGI scope type '{kind}'"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// The `type` key of an inbound event.
pub fn message_type(event: &Value) -> Result<&str, ProtocolError> {
    scope::required_str(event, "type")
}

/// Require an inbound event of type `expected`.
pub fn expect_message(event: &Value, expected: &'static str) -> Result<(), ProtocolError> {
    let got = message_type(event)?;
    if got == expected {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedMessage {
            expected,
            got: got.to_owned(),
        })
    }
}
