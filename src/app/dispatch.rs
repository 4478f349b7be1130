//! Request lifecycle for HTTP and WebSocket connections.
//!
//! Every request runs as one [`Task`]. Slot 0 holds the shared
//! [`RequestState`]; slot 1 holds the body buffer while chunks arrive. Steps
//! are chained through callbacks:
//!
//! ```text
//! receive -> body_chunk -> (receive -> body_chunk)* -> bind -> handler
//!         -> handle_route_callback -> send start -> send body
//! ```
//!
//! Handler failures land in `route_error`, which turns them into an error
//! response, a WebSocket 1006 close, or a 500.

use super::App;
use crate::awaitable::{CallbackError, Callbacks, ErrorOutcome, Task, TaskError};
use crate::context::Context;
use crate::errors::{reason_phrase, HttpError};
use crate::ids::RequestId;
use crate::logging::route_log;
use crate::protocol::{Headers, Outbound, ProtocolError, Receiver, Scope, ScopeKind, Sender};
use crate::results::{default_headers, HandlerResult, Produced, ResultError};
use crate::route::{Arg, Args, CachedResponse, Route, RouteInput};
use crate::router::{MethodTable, ParamVec, Resolution};
use crate::typecode::cast;
use crate::value::{Dict, Value};
use crate::websocket::WebSocket;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, warn};

const STATE_SLOT: usize = 0;
const BODY_SLOT: usize = 1;

/// Close code sent when a WebSocket handler fails.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Value passed between the steps of a request task.
#[derive(Debug)]
pub enum Flow {
    /// An inbound event from the transport.
    Received(Value),
    /// What a handler returned.
    Returned(HandlerResult),
    /// A message was handed to the transport.
    Sent,
    /// A step with no value, such as a lifespan hook.
    Done,
}

impl Flow {
    pub(super) fn into_received(self) -> Result<Value, TaskError> {
        match self {
            Flow::Received(event) => Ok(event),
            other => Err(TaskError::failed(anyhow::anyhow!(
                "expected a received event, got {other:?}"
            ))),
        }
    }

    pub(super) fn into_returned(self) -> Result<HandlerResult, TaskError> {
        match self {
            Flow::Returned(result) => Ok(result),
            other => Err(TaskError::failed(anyhow::anyhow!(
                "expected a handler result, got {other:?}"
            ))),
        }
    }
}

/// Everything the callbacks of one request share.
pub(super) struct RequestState {
    app: Arc<App>,
    route: Option<Arc<Route>>,
    scope: Scope,
    params: ParamVec,
    receive: Arc<dyn Receiver>,
    send: Arc<dyn Sender>,
    method: String,
    is_http: bool,
    request_id: RequestId,
    handler_called: AtomicBool,
    context: OnceLock<Arc<Context>>,
}

impl RequestState {
    /// The request context, built on first use.
    fn context(&self) -> Result<Arc<Context>, ProtocolError> {
        if let Some(context) = self.context.get() {
            return Ok(Arc::clone(context));
        }
        let context = Arc::new(Context::from_scope(&self.scope)?);
        Ok(Arc::clone(self.context.get_or_init(|| context)))
    }

    fn websocket(&self) -> WebSocket {
        WebSocket::new(Arc::clone(&self.receive), Arc::clone(&self.send))
    }

    fn log(&self, status: u16) {
        route_log(status, &self.scope.path, &self.method);
    }
}

pub(super) fn received(receive: &Arc<dyn Receiver>) -> impl Future<Output = Result<Flow, TaskError>> + Send + 'static {
    receive
        .receive()
        .map(|event| event.map(Flow::Received).map_err(TaskError::failed))
}

pub(super) fn sent(send: &Arc<dyn Sender>, message: Outbound) -> impl Future<Output = Result<Flow, TaskError>> + Send + 'static {
    send.send(message)
        .map(|outcome| outcome.map(|()| Flow::Sent).map_err(TaskError::failed))
}

fn returned(
    future: BoxFuture<'static, anyhow::Result<HandlerResult>>,
) -> impl Future<Output = Result<Flow, TaskError>> + Send + 'static {
    future.map(|outcome| outcome.map(Flow::Returned).map_err(TaskError::failed))
}

/// Protocol violations fail the request outright.
pub(super) fn defer(err: ProtocolError) -> CallbackError {
    CallbackError::Defer(TaskError::failed(err))
}

fn raise(err: ResultError) -> CallbackError {
    CallbackError::Raise(TaskError::failed(err))
}

fn request_state(task: &Task<Flow>) -> Result<Arc<RequestState>, TaskError> {
    task.slots().value::<Arc<RequestState>>(STATE_SLOT).map(Arc::clone)
}

/// Queue the start and body messages of a response.
fn send_response(
    task: &mut Task<Flow>,
    state: &RequestState,
    status: u16,
    headers: Headers,
    body: Arc<[u8]>,
) -> Result<(), TaskError> {
    let websocket = !state.is_http;
    task.add_await(
        sent(&state.send, Outbound::ResponseStart { status, headers, websocket }),
        Callbacks::none(),
    )?;
    task.add_await(
        sent(&state.send, Outbound::ResponseBody { body, websocket }),
        Callbacks::none(),
    )
}

fn send_raw_text(task: &mut Task<Flow>, state: &RequestState, status: u16, text: &str) -> Result<(), TaskError> {
    send_response(task, state, status, default_headers(), Arc::from(text.as_bytes()))
}

/// Answer with `status`.
///
/// Uses the route's handler for the status, then the application's, then a
/// plain-text body of `message` or the reason phrase. Returns whether a
/// handler was invoked.
fn fire_error(
    task: &mut Task<Flow>,
    state: &RequestState,
    status: u16,
    message: Option<String>,
) -> Result<bool, TaskError> {
    let handler = state
        .route
        .as_ref()
        .and_then(|route| route.errors().get(status))
        .or_else(|| state.app.errors.get(status))
        .cloned();

    if let Some(handler) = handler {
        state.handler_called.store(true, Ordering::Release);
        task.add_await(
            returned(handler.call(Args::new())),
            Callbacks::then(error_result_callback).and_catch(error_handler_failed),
        )?;
        return Ok(true);
    }

    let text = message
        .or_else(|| reason_phrase(status).map(str::to_owned))
        .unwrap_or_else(|| status.to_string());
    state.log(status);
    send_raw_text(task, state, status, &text)?;
    Ok(false)
}

/// A 400 for bad input. The cause is only shown in development mode.
fn client_error(task: &mut Task<Flow>, state: &RequestState, cause: &dyn fmt::Display) -> Result<(), TaskError> {
    debug!(request_id = %state.request_id, cause = %cause, "rejecting request input");
    let message = state.app.dev.then(|| cause.to_string());
    fire_error(task, state, 400, message).map(|_| ())
}

/// A server error. Logged as unhandled when no error handler took it.
fn server_error(task: &mut Task<Flow>, state: &RequestState, status: u16, cause: &dyn fmt::Display) -> Result<(), TaskError> {
    let message = state.app.dev.then(|| cause.to_string());
    let called = fire_error(task, state, status, message)?;
    if !called && !state.handler_called.load(Ordering::Acquire) {
        error!(
            request_id = %state.request_id,
            status,
            path = %state.scope.path,
            error = %cause,
            "unhandled error in route handler"
        );
    }
    Ok(())
}

/// Resolve `scope` and queue the first steps of its request.
pub(super) fn start(
    app: &Arc<App>,
    task: &mut Task<Flow>,
    scope: Scope,
    receive: Arc<dyn Receiver>,
    send: Arc<dyn Sender>,
) -> Result<(), TaskError> {
    let is_http = scope.kind == ScopeKind::Http;
    let (table, method) = match &scope.method {
        Some(method) if is_http => (MethodTable::for_method(method), method.clone()),
        _ => (MethodTable::WebSocket, "websocket".to_owned()),
    };

    let (route, params, miss) = match app.routes.resolve(table, &scope.path) {
        Resolution::Found { route, params } => (Some(route), params, None),
        Resolution::MethodNotAllowed => (None, ParamVec::new(), Some(405)),
        Resolution::NotFound => (None, ParamVec::new(), Some(404)),
    };

    let state = Arc::new(RequestState {
        app: Arc::clone(app),
        route: route.clone(),
        request_id: RequestId::for_scope(&scope),
        scope,
        params,
        receive,
        send,
        method,
        is_http,
        handler_called: AtomicBool::new(false),
        context: OnceLock::new(),
    });
    task.slots_mut().save_value(Arc::clone(&state))?;

    let route = match (route, miss) {
        (Some(route), _) => route,
        (None, status) => {
            fire_error(task, &state, status.unwrap_or(404), None)?;
            return Ok(());
        }
    };
    debug!(request_id = %state.request_id, path = %state.scope.path, method = %state.method, "route matched");

    if state.is_http {
        if let Some(cached) = route.cache().lookup() {
            state.log(cached.status);
            return send_response(
                task,
                &state,
                cached.status,
                Arc::clone(&cached.headers),
                Arc::clone(&cached.body),
            );
        }
    }

    if route.has_body() {
        task.slots_mut().save_value(Vec::<u8>::new())?;
        return task.add_await(received(&state.receive), body_callbacks(route));
    }

    bind_and_call(task, &state, &route, None).map_err(|err| match err {
        CallbackError::Raise(err) | CallbackError::Defer(err) => err,
    })
}

fn body_callbacks(route: Arc<Route>) -> Callbacks<Flow> {
    Callbacks::then(move |task, flow| body_chunk(task, flow, route))
}

fn route_callbacks(route: &Arc<Route>) -> Callbacks<Flow> {
    let route = Arc::clone(route);
    Callbacks::then(move |task, flow| handle_route_callback(task, flow, route)).and_catch(route_error)
}

/// Append one `http.request` chunk; bind once the last chunk arrived.
fn body_chunk(task: &mut Task<Flow>, flow: Flow, route: Arc<Route>) -> Result<(), CallbackError> {
    let event = flow.into_received()?;
    let state = request_state(task)?;

    let chunk = event
        .get("body")
        .ok_or(ProtocolError::MissingKey("body"))
        .and_then(|body| {
            body.as_bytes()
                .ok_or_else(|| ProtocolError::BadMessage("'body' must be bytes".to_owned()))
        })
        .map_err(defer)?;
    let more_body = event
        .get("more_body")
        .ok_or(ProtocolError::MissingKey("more_body"))
        .and_then(|more| {
            more.as_bool()
                .ok_or_else(|| ProtocolError::BadMessage("'more_body' must be a bool".to_owned()))
        })
        .map_err(defer)?;

    task.slots_mut()
        .value_mut::<Vec<u8>>(BODY_SLOT)?
        .extend_from_slice(chunk);

    if more_body {
        task.add_await(received(&state.receive), body_callbacks(route))?;
        return Ok(());
    }

    let body = std::mem::take(task.slots_mut().value_mut::<Vec<u8>>(BODY_SLOT)?);
    bind_and_call(task, &state, &route, Some(&body))
}

/// Decode a request body into a mapping. An empty body is an empty mapping.
fn parse_body(state: &RequestState, body: &[u8]) -> Result<Dict, String> {
    if body.is_empty() {
        return Ok(Dict::new());
    }
    let text = std::str::from_utf8(body).map_err(|e| format!("body is not UTF-8: {e}"))?;
    match state.app.parsers.json.parse(text) {
        Ok(Value::Dict(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object body, got {}", other.type_name())),
        Err(e) => Err(e.to_string()),
    }
}

/// Build the handler arguments and queue the handler.
///
/// Path parameters come first, then each declared input in order. Bad input
/// answers 400 instead of calling the handler.
fn bind_and_call(
    task: &mut Task<Flow>,
    state: &RequestState,
    route: &Arc<Route>,
    body: Option<&[u8]>,
) -> Result<(), CallbackError> {
    let mut args = Args::new();
    for param in &state.params {
        args.push(Arg::Value(Value::Str(param.clone())));
    }

    if !route.inputs().is_empty() {
        let parsers = &state.app.parsers;
        let query = match parsers.query.parse(&state.scope.query_string) {
            Ok(query) => query,
            Err(e) => return Ok(client_error(task, state, &e)?),
        };
        let body = match body.map(|body| parse_body(state, body)).transpose() {
            Ok(body) => body.unwrap_or_default(),
            Err(e) => return Ok(client_error(task, state, &e)?),
        };

        for input in route.inputs() {
            let input = match input {
                RouteInput::Context => {
                    args.push(Arg::Context(state.context().map_err(defer)?));
                    continue;
                }
                RouteInput::WebSocket => {
                    args.push(Arg::WebSocket(state.websocket()));
                    continue;
                }
                RouteInput::Parsed(input) => input,
            };

            let source = if input.is_body { &body } else { &query };
            let value = match (source.get(&input.name), &input.default) {
                (Some(raw), _) => match cast(&input.types, raw, parsers.json.as_ref(), true) {
                    Ok(value) => value,
                    Err(e) => {
                        let cause = format!("invalid value for '{}': {e}", input.name);
                        return Ok(client_error(task, state, &cause)?);
                    }
                },
                (None, Some(default)) => {
                    args.push(Arg::Value(default.resolve()));
                    continue;
                }
                (None, None) => {
                    let cause = format!("missing required input '{}'", input.name);
                    return Ok(client_error(task, state, &cause)?);
                }
            };

            if !input.validators.iter().all(|check| check(&value)) {
                let cause = format!("validation failed for '{}'", input.name);
                return Ok(client_error(task, state, &cause)?);
            }
            args.push(Arg::Value(value));
        }
    }

    task.add_await(returned(route.handler().call(args)), route_callbacks(route))?;
    Ok(())
}

/// Resolve result producers. `None` means a pending producer was queued with
/// `callbacks` and the caller has nothing more to do.
fn resolve_producer(
    task: &mut Task<Flow>,
    state: &RequestState,
    mut result: HandlerResult,
    callbacks: impl FnOnce() -> Callbacks<Flow>,
) -> Result<Option<HandlerResult>, CallbackError> {
    loop {
        let producer = match result {
            HandlerResult::Producer(producer) => producer,
            other => return Ok(Some(other)),
        };
        let context = state.context().map_err(defer)?;
        match producer.view_result(&context) {
            Produced::Ready(next) => result = next,
            Produced::Pending(future) => {
                task.add_await(returned(future), callbacks())?;
                return Ok(None);
            }
        }
    }
}

/// Send what a route handler returned.
fn handle_route_callback(task: &mut Task<Flow>, flow: Flow, route: Arc<Route>) -> Result<(), CallbackError> {
    let state = request_state(task)?;
    let result = flow.into_returned()?;
    let Some(result) = resolve_producer(task, &state, result, || route_callbacks(&route))? else {
        return Ok(());
    };

    if !route.is_http() {
        if result.is_empty() {
            route_log(1000, &state.scope.path, "websocket_closed");
            return Ok(());
        }
        let payload = result.into_payload().map_err(raise)?;
        task.add_await(sent(&state.send, Outbound::WebSocketSend(payload)), Callbacks::none())?;
        return Ok(());
    }

    let response = result.normalize().map_err(raise)?;
    if route.cache().is_enabled() {
        route.cache().store(CachedResponse {
            status: response.status,
            body: Arc::clone(&response.body),
            headers: Arc::clone(&response.headers),
        });
    }
    state.log(response.status);
    send_response(task, &state, response.status, response.headers, response.body)?;
    Ok(())
}

/// Send what an error or exception handler returned.
fn error_result_callback(task: &mut Task<Flow>, flow: Flow) -> Result<(), CallbackError> {
    let state = request_state(task)?;
    let result = flow.into_returned()?;
    let Some(result) = resolve_producer(task, &state, result, || {
        Callbacks::then(error_result_callback).and_catch(error_handler_failed)
    })?
    else {
        return Ok(());
    };
    let response = result.normalize().map_err(raise)?;
    state.log(response.status);
    send_response(task, &state, response.status, response.headers, response.body)?;
    Ok(())
}

/// An error handler itself failed: fall back to a fixed 500.
fn error_handler_failed(task: &mut Task<Flow>, err: &TaskError) -> ErrorOutcome {
    if err.is_engine_error() {
        return ErrorOutcome::Reraise;
    }
    let Ok(state) = request_state(task) else {
        return ErrorOutcome::Reraise;
    };
    error!(request_id = %state.request_id, error = %err, "error handler failed");
    state.log(500);
    match send_raw_text(task, &state, 500, "failed to dispatch error handler") {
        Ok(()) => ErrorOutcome::Handled,
        Err(e) => ErrorOutcome::Replace(e),
    }
}

/// Turn a route handler failure into a response.
fn route_error(task: &mut Task<Flow>, err: &TaskError) -> ErrorOutcome {
    if err.is_engine_error() {
        return ErrorOutcome::Reraise;
    }
    let Ok(state) = request_state(task) else {
        return ErrorOutcome::Reraise;
    };
    match answer_route_error(task, &state, err) {
        Ok(()) => ErrorOutcome::Handled,
        Err(e) => ErrorOutcome::Replace(e),
    }
}

fn answer_route_error(task: &mut Task<Flow>, state: &RequestState, err: &TaskError) -> Result<(), TaskError> {
    if let Some(http) = err.downcast_ref::<HttpError>() {
        fire_error(task, state, http.status, http.message.clone())?;
        return Ok(());
    }

    if let TaskError::Failed(source) = err {
        if let Some(future) = state.app.exceptions.iter().find_map(|handler| handler(source)) {
            state.handler_called.store(true, Ordering::Release);
            task.add_await(
                returned(future),
                Callbacks::then(error_result_callback).and_catch(error_handler_failed),
            )?;
            return Ok(());
        }
    }

    if !state.is_http {
        warn!(
            request_id = %state.request_id,
            path = %state.scope.path,
            error = %err,
            "websocket handler failed"
        );
        let reason = state.app.dev.then(|| err.to_string());
        task.add_await(
            sent(
                &state.send,
                Outbound::WebSocketClose {
                    code: ABNORMAL_CLOSURE,
                    reason,
                },
            ),
            Callbacks::none(),
        )?;
        return Ok(());
    }

    server_error(task, state, 500, err)
}
