//! # Route Module
//!
//! A [`Route`] is one registered endpoint: the handler, its declared inputs,
//! its response cache and its status-code overrides. Routes are built from a
//! [`RouteSpec`] when they are registered on the application and are shared
//! (`Arc<Route>`) between the route tables and in-flight requests.

mod cache;
mod handler;
mod input;

pub use cache::{CachedResponse, RouteCache};
pub use handler::{handler, Arg, Args, Handler, MAX_INLINE_ARGS};
pub use input::{InputValidator, ParsedInput, RouteInput, CONTEXT_INPUT, WEBSOCKET_INPUT};

use crate::array::ViewArray;
use crate::errors::ErrorHandlers;
use crate::router::{PathPart, RegistrationError};
use std::fmt;
use std::sync::Arc;

/// Transport a route answers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Http,
    WebSocket,
}

/// A registered endpoint.
pub struct Route {
    handler: Arc<dyn Handler>,
    inputs: ViewArray<RouteInput>,
    cache: RouteCache,
    errors: ErrorHandlers,
    kind: RouteKind,
    has_body: bool,
}

impl Route {
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    #[must_use]
    pub fn inputs(&self) -> &[RouteInput] {
        self.inputs.as_slice()
    }

    #[must_use]
    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Route-level status-code overrides.
    #[must_use]
    pub fn errors(&self) -> &ErrorHandlers {
        &self.errors
    }

    #[must_use]
    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    #[must_use]
    pub fn is_http(&self) -> bool {
        self.kind == RouteKind::Http
    }

    /// True when any input is read from the request body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.has_body
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("cache_rate", &self.cache.rate())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Everything needed to register a route.
pub struct RouteSpec {
    handler: Arc<dyn Handler>,
    inputs: Vec<RouteInput>,
    cache_rate: i64,
    errors: Vec<(u16, Arc<dyn Handler>)>,
    parts: Option<Vec<PathPart>>,
}

impl RouteSpec {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            inputs: Vec::new(),
            cache_rate: -1,
            errors: Vec::new(),
            parts: None,
        }
    }

    #[must_use]
    pub fn input(mut self, input: RouteInput) -> Self {
        self.inputs.push(input);
        self
    }

    #[must_use]
    pub fn inputs(mut self, inputs: impl IntoIterator<Item = RouteInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// `-1` disables caching, `0` always regenerates, `N > 0` replays each
    /// generated response for `N` requests in total.
    #[must_use]
    pub fn cache_rate(mut self, rate: i64) -> Self {
        self.cache_rate = rate;
        self
    }

    /// Route-level override for a status code.
    #[must_use]
    pub fn error_handler(mut self, status: u16, handler: Arc<dyn Handler>) -> Self {
        self.errors.push((status, handler));
        self
    }

    /// Explicit path parts. Paths containing `{name}` segments derive them
    /// automatically.
    #[must_use]
    pub fn parts(mut self, parts: Vec<PathPart>) -> Self {
        self.parts = Some(parts);
        self
    }

    pub(crate) fn take_parts(&mut self) -> Option<Vec<PathPart>> {
        self.parts.take()
    }

    pub(crate) fn build(self, kind: RouteKind) -> Result<Route, RegistrationError> {
        let mut errors = ErrorHandlers::new();
        for (status, handler) in self.errors {
            errors.set(status, handler)?;
        }
        let has_body = self.inputs.iter().any(RouteInput::is_body);
        let mut inputs = ViewArray::with_capacity(self.inputs.len().max(1))?;
        for input in self.inputs {
            inputs.append(input)?;
        }
        Ok(Route {
            handler: self.handler,
            inputs,
            cache: RouteCache::new(self.cache_rate),
            errors,
            kind,
            has_body,
        })
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("inputs", &self.inputs)
            .field("cache_rate", &self.cache_rate)
            .field("parts", &self.parts)
            .finish_non_exhaustive()
    }
}
