//! # Application Module
//!
//! [`App`] owns everything a request needs: the route tables, application-wide
//! error handlers, exception handlers, parsers, lifespan hooks and the pool of
//! recycled request tasks. It is configured once with `&mut self` methods and
//! then shared as `Arc<App>` by every in-flight request.
//!
//! ## Request flow
//!
//! [`App::call`] parses the connection scope and returns a [`Task`] that
//! drives the whole exchange:
//!
//! - **lifespan**: startup and shutdown hooks, answered with the matching
//!   `*.complete` messages
//! - **http / websocket**: route resolution, cached replay, body accumulation,
//!   input binding, handler invocation and response sending
//!
//! Every failure that is not a protocol violation ends in a response: the
//! route's or the application's handler for the status, or a plain-text
//! default carrying the reason phrase.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use viewcore::app::App;
//! use viewcore::config::AppConfig;
//! use viewcore::results::HandlerResult;
//! use viewcore::route::{handler, Args, RouteSpec};
//!
//! let mut app = App::new(&AppConfig::default()).unwrap();
//! app.get(
//!     "/hello",
//!     RouteSpec::new(handler(|_: Args| async { anyhow::Ok(HandlerResult::from("hi")) })),
//! )
//! .unwrap();
//! let app = Arc::new(app);
//! ```

mod dispatch;
mod lifespan;

pub use dispatch::Flow;

use crate::awaitable::{Task, TaskError, TaskPool};
use crate::config::AppConfig;
use crate::errors::ErrorHandlers;
use crate::ids::RequestId;
use crate::map::MapError;
use crate::parsers::Parsers;
use crate::protocol::{ProtocolError, Receiver, Scope, ScopeKind, Sender};
use crate::results::HandlerResult;
use crate::route::{Handler, RouteKind, RouteSpec};
use crate::router::{MethodTable, PathPart, RegistrationError, RouteTable};
use crate::value::Value;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Startup or cleanup hook.
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Returns a response future when the error is of the handler's type.
type ExceptionHandler =
    Arc<dyn Fn(&anyhow::Error) -> Option<BoxFuture<'static, anyhow::Result<HandlerResult>>> + Send + Sync>;

/// Failure to start or finish a request.
#[derive(Debug)]
pub enum DispatchError {
    /// The transport broke the protocol contract.
    Protocol(ProtocolError),
    /// The request task failed and no response could be produced.
    Task(TaskError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Protocol(e) => write!(f, "{e}"),
            DispatchError::Task(e) => write!(f, "request task failed: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Protocol(e) => Some(e),
            DispatchError::Task(e) => Some(e),
        }
    }
}

impl From<ProtocolError> for DispatchError {
    fn from(err: ProtocolError) -> Self {
        DispatchError::Protocol(err)
    }
}

impl From<TaskError> for DispatchError {
    /// Protocol violations raised inside a step are reported as such.
    fn from(err: TaskError) -> Self {
        match err.downcast_ref::<ProtocolError>() {
            Some(protocol) => DispatchError::Protocol(protocol.clone()),
            None => DispatchError::Task(err),
        }
    }
}

/// The application aggregate.
pub struct App {
    routes: RouteTable,
    errors: ErrorHandlers,
    exceptions: Vec<ExceptionHandler>,
    parsers: Parsers,
    dev: bool,
    startup: Option<Hook>,
    cleanup: Option<Hook>,
    pool: TaskPool<Flow>,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self, MapError> {
        Ok(Self {
            routes: RouteTable::new(config.map_capacity)?,
            errors: ErrorHandlers::new(),
            exceptions: Vec::new(),
            parsers: Parsers::default(),
            dev: config.dev,
            startup: None,
            cleanup: None,
            pool: TaskPool::new(config.task_pool_size),
        })
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.dev
    }

    /// Development mode puts error text into 500 bodies and 1006 close reasons.
    pub fn set_dev(&mut self, dev: bool) {
        self.dev = dev;
    }

    #[must_use]
    pub fn parsers(&self) -> &Parsers {
        &self.parsers
    }

    pub fn set_parsers(&mut self, parsers: Parsers) {
        self.parsers = parsers;
    }

    /// Register a route for an HTTP method.
    ///
    /// Paths with `{name}` segments (or specs with explicit parts) capture
    /// those segments as leading positional arguments.
    pub fn register(&mut self, method: &http::Method, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        let table = MethodTable::for_http(method)
            .ok_or_else(|| RegistrationError::UnsupportedMethod(method.to_string()))?;
        self.add_route(table, RouteKind::Http, path, spec)
    }

    pub fn get(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.register(&http::Method::GET, path, spec)
    }

    pub fn post(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.register(&http::Method::POST, path, spec)
    }

    pub fn put(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.register(&http::Method::PUT, path, spec)
    }

    pub fn patch(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.register(&http::Method::PATCH, path, spec)
    }

    pub fn delete(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.register(&http::Method::DELETE, path, spec)
    }

    pub fn options(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.register(&http::Method::OPTIONS, path, spec)
    }

    pub fn websocket(&mut self, path: &str, spec: RouteSpec) -> Result<(), RegistrationError> {
        self.add_route(MethodTable::WebSocket, RouteKind::WebSocket, path, spec)
    }

    fn add_route(
        &mut self,
        table: MethodTable,
        kind: RouteKind,
        path: &str,
        mut spec: RouteSpec,
    ) -> Result<(), RegistrationError> {
        let parts = spec
            .take_parts()
            .or_else(|| PathPart::is_template(path).then(|| PathPart::parse_template(path)));
        let route = Arc::new(spec.build(kind)?);
        self.routes.insert(table, path, parts.as_deref(), route)
    }

    /// Application-wide handler for a status code.
    pub fn error_handler(&mut self, status: u16, handler: Arc<dyn Handler>) -> Result<(), RegistrationError> {
        self.errors.set(status, handler)
    }

    /// Handler for handler errors of type `E`. Handlers are tried in
    /// registration order.
    pub fn exception_handler<E, F, Fut>(&mut self, handler: F)
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
        F: Fn(&E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<HandlerResult>> + Send + 'static,
    {
        self.exceptions.push(Arc::new(move |err: &anyhow::Error| {
            err.downcast_ref::<E>()
                .map(|matched| -> BoxFuture<'static, anyhow::Result<HandlerResult>> { Box::pin(handler(matched)) })
        }));
    }

    pub fn on_startup<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.startup = Some(Arc::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(hook()) }));
    }

    pub fn on_cleanup<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cleanup = Some(Arc::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(hook()) }));
    }

    /// Start handling one connection.
    ///
    /// The returned task performs the whole exchange when awaited. Hand it
    /// back with [`App::release`] once it has finished.
    pub fn call(
        self: &Arc<Self>,
        scope: Value,
        receive: Arc<dyn Receiver>,
        send: Arc<dyn Sender>,
    ) -> Result<Task<Flow>, DispatchError> {
        let scope = Scope::parse(scope)?;
        let mut task = self.pool.acquire();
        let started = match scope.kind {
            ScopeKind::Lifespan => lifespan::start(self, &mut task, receive, send),
            ScopeKind::Http | ScopeKind::WebSocket => dispatch::start(self, &mut task, scope, receive, send),
        };
        if let Err(err) = started {
            task.cancel();
            self.release(task);
            return Err(err.into());
        }
        Ok(task)
    }

    /// Return a finished task to the pool. Unfinished tasks are dropped.
    pub fn release(&self, task: Task<Flow>) {
        if let Err(err) = self.pool.release(task) {
            debug!(error = %err, "task not pooled");
        }
    }

    /// Handle one connection to completion inside a request span.
    pub async fn handle(
        self: &Arc<Self>,
        scope: Value,
        receive: Arc<dyn Receiver>,
        send: Arc<dyn Sender>,
    ) -> Result<(), DispatchError> {
        let parsed = Scope::parse(scope.clone())?;
        let request_id = RequestId::for_scope(&parsed);
        let span = info_span!(
            "request",
            request_id = %request_id,
            kind = parsed.kind.as_str(),
            path = %parsed.path,
        );
        let mut task = self.call(scope, receive, send)?;
        let outcome = (&mut task).instrument(span).await;
        self.release(task);
        outcome.map(|_| ()).map_err(DispatchError::from)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes)
            .field("errors", &self.errors)
            .field("exceptions", &self.exceptions.len())
            .field("dev", &self.dev)
            .field("pool_capacity", &self.pool.capacity())
            .finish_non_exhaustive()
    }
}
