//! # Error Pipeline Tables
//!
//! Status codes are hashed into fixed slot arrays so that resolving the handler
//! for a firing error is two array reads: the route's override, then the
//! application's.
//!
//! | Range | Slots |
//! |---|---|
//! | 400-418 | 0-18 |
//! | 421-426 | 19-24 |
//! | 428-429 | 25-26 |
//! | 431 | 27 |
//! | 451 | 28 |
//! | 500-508 | 0-8 |
//! | 510-511 | 9-10 |
//!
//! Any other status is not a valid error status.

use crate::route::Handler;
use crate::router::RegistrationError;
use std::fmt;
use std::sync::Arc;

/// Number of client-error (4xx) handler slots.
pub const CLIENT_ERROR_SLOTS: usize = 29;
/// Number of server-error (5xx) handler slots.
pub const SERVER_ERROR_SLOTS: usize = 11;

/// Slot index for a 4xx status.
#[must_use]
pub fn client_error_index(status: u16) -> Option<usize> {
    let index = match status {
        400..=418 => status - 400,
        421..=426 => status - 402,
        428..=429 => status - 403,
        431 => 27,
        451 => 28,
        _ => return None,
    };
    Some(usize::from(index))
}

/// Slot index for a 5xx status.
#[must_use]
pub fn server_error_index(status: u16) -> Option<usize> {
    let index = match status {
        500..=508 => status - 500,
        510..=511 => status - 501,
        _ => return None,
    };
    Some(usize::from(index))
}

/// Standard reason phrase for an error status.
#[must_use]
pub fn reason_phrase(status: u16) -> Option<&'static str> {
    let phrase = match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Content",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable for Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => return None,
    };
    Some(phrase)
}

/// True when `status` has a handler slot.
#[must_use]
pub fn is_error_status(status: u16) -> bool {
    client_error_index(status).is_some() || server_error_index(status).is_some()
}

/// Status-code handler overrides for one route or for the whole application.
#[derive(Clone)]
pub struct ErrorHandlers {
    client: [Option<Arc<dyn Handler>>; CLIENT_ERROR_SLOTS],
    server: [Option<Arc<dyn Handler>>; SERVER_ERROR_SLOTS],
}

impl Default for ErrorHandlers {
    fn default() -> Self {
        Self {
            client: std::array::from_fn(|_| None),
            server: std::array::from_fn(|_| None),
        }
    }
}

impl ErrorHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `status`, replacing any previous one.
    pub fn set(&mut self, status: u16, handler: Arc<dyn Handler>) -> Result<(), RegistrationError> {
        let slot = if status >= 500 {
            server_error_index(status).map(|i| &mut self.server[i])
        } else {
            client_error_index(status).map(|i| &mut self.client[i])
        };
        let slot = slot.ok_or(RegistrationError::InvalidStatus(status))?;
        *slot = Some(handler);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, status: u16) -> Option<&Arc<dyn Handler>> {
        if status >= 500 {
            self.server[server_error_index(status)?].as_ref()
        } else {
            self.client[client_error_index(status)?].as_ref()
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.client
            .iter()
            .chain(self.server.iter())
            .filter(|slot| slot.is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlers")
            .field("installed", &self.len())
            .finish()
    }
}

/// Error a handler raises to answer with a specific status.
///
/// Without a message the response body is the status reason phrase (or
/// whatever the installed handler for the status produces).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: u16,
    pub message: Option<String>,
}

impl HttpError {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, reason_phrase(self.status)) {
            (Some(message), _) => write!(f, "{} {message}", self.status),
            (None, Some(reason)) => write!(f, "{} {reason}", self.status),
            (None, None) => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}
