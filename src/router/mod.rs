//! # Router Module
//!
//! Maps a method and path to a registered [`Route`](crate::route::Route).
//!
//! ## Overview
//!
//! - One [`ViewMap`](crate::map::ViewMap) per HTTP method (GET, POST, PUT,
//!   PATCH, DELETE, OPTIONS) plus one for WebSocket routes.
//! - An umbrella map of every registered path distinguishes 404 (unknown
//!   path) from 405 (known path, other method).
//! - Routes with path parameters are threaded through a transport trie that
//!   shares the per-method maps (see the `transport` submodule).
//!
//! ## Resolution
//!
//! 1. Normalise the path: strip one trailing slash unless the path is `/`.
//! 2. Pick the table: WebSocket for WebSocket connections, the method's table
//!    otherwise, GET for unknown methods.
//! 3. Direct lookup. A hit on a node that carries a route is final.
//! 4. If parameterised routes exist, walk the trie, literal segments first.
//!    Captured segments become leading positional handler arguments.
//! 5. Otherwise 405 when the path is registered elsewhere, else 404.
//!
//! ## Example
//!
//! ```rust
//! use viewcore::router::{normalize_path, MethodTable, PathPart};
//!
//! assert_eq!(normalize_path("/widgets/"), "/widgets");
//! assert_eq!(normalize_path("/"), "/");
//! assert_eq!(MethodTable::for_method("BREW"), MethodTable::Get);
//! assert_eq!(
//!     PathPart::parse_template("/app/{id}/index"),
//!     vec![PathPart::literal("app"), PathPart::Param, PathPart::literal("index")]
//! );
//! ```

mod core;
#[cfg(test)]
mod tests;
mod transport;

pub use core::{Resolution, RouteTable};
pub use transport::RouteNode;

use crate::array::ArrayError;
use crate::map::MapError;
use crate::typecode::DescriptorError;
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path-parameter values, in path order.
pub type ParamVec = SmallVec<[String; MAX_INLINE_PARAMS]>;

/// Strip one trailing slash, keeping the root path intact.
#[must_use]
pub fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// One registered path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Literal(String),
    /// Matches any single segment and captures it.
    Param,
}

impl PathPart {
    pub fn literal(segment: impl Into<String>) -> Self {
        PathPart::Literal(segment.into())
    }

    /// Split a `/a/{b}/c` template into parts. Empty segments are skipped.
    #[must_use]
    pub fn parse_template(path: &str) -> Vec<PathPart> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    PathPart::Param
                } else {
                    PathPart::literal(segment)
                }
            })
            .collect()
    }

    /// True when `path` contains at least one `{name}` segment.
    #[must_use]
    pub fn is_template(path: &str) -> bool {
        path.split('/')
            .any(|segment| segment.starts_with('{') && segment.ends_with('}'))
    }
}

/// Which route table a request consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodTable {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    WebSocket,
}

impl MethodTable {
    /// Table for an HTTP method name; unknown methods use GET.
    #[must_use]
    pub fn for_method(method: &str) -> Self {
        match method {
            "POST" => MethodTable::Post,
            "PUT" => MethodTable::Put,
            "PATCH" => MethodTable::Patch,
            "DELETE" => MethodTable::Delete,
            "OPTIONS" => MethodTable::Options,
            _ => MethodTable::Get,
        }
    }

    /// Table for a registration method, `None` for methods without a table.
    #[must_use]
    pub fn for_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET => Some(MethodTable::Get),
            http::Method::POST => Some(MethodTable::Post),
            http::Method::PUT => Some(MethodTable::Put),
            http::Method::PATCH => Some(MethodTable::Patch),
            http::Method::DELETE => Some(MethodTable::Delete),
            http::Method::OPTIONS => Some(MethodTable::Options),
            _ => None,
        }
    }
}

/// Errors raised while registering routes or handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Not a status code with a handler slot.
    InvalidStatus(u16),
    /// The first path part of a parameterised route must be a literal.
    LeadingParameter(String),
    /// A parameterised route with no parts.
    EmptyParts(String),
    /// The method has no route table.
    UnsupportedMethod(String),
    Map(MapError),
    Array(ArrayError),
    Descriptor(DescriptorError),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidStatus(status) => {
                write!(f, "{status} is not a valid status code")
            }
            RegistrationError::LeadingParameter(path) => {
                write!(f, "first part of {path} must not be a path parameter")
            }
            RegistrationError::EmptyParts(path) => write!(f, "no path parts given for {path}"),
            RegistrationError::UnsupportedMethod(method) => {
                write!(f, "no route table for method {method}")
            }
            RegistrationError::Map(e) => write!(f, "route table error: {e}"),
            RegistrationError::Array(e) => write!(f, "route input error: {e}"),
            RegistrationError::Descriptor(e) => write!(f, "route input error: {e}"),
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistrationError::Map(e) => Some(e),
            RegistrationError::Array(e) => Some(e),
            RegistrationError::Descriptor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MapError> for RegistrationError {
    fn from(err: MapError) -> Self {
        RegistrationError::Map(err)
    }
}

impl From<ArrayError> for RegistrationError {
    fn from(err: ArrayError) -> Self {
        RegistrationError::Array(err)
    }
}

impl From<DescriptorError> for RegistrationError {
    fn from(err: DescriptorError) -> Self {
        RegistrationError::Descriptor(err)
    }
}
