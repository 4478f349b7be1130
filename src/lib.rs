//! # viewcore
//!
//! **viewcore** is the native dispatch core of an ASGI-style web framework. A
//! host (an ASGI server bridge, a test harness, an embedding runtime) hands it
//! a connection scope plus `receive`/`send` collaborators; viewcore resolves
//! the route, binds and casts handler inputs, drives the handler and emits the
//! response messages.
//!
//! ## Architecture
//!
//! - **[`map`]** / **[`array`]** - open-addressing string map and bounded
//!   dynamic array used by the route tables
//! - **[`value`]** - dynamic values crossing the untyped boundary
//! - **[`typecode`]** - type descriptors and the cast engine that validates
//!   query and body inputs
//! - **[`awaitable`]** - callback-driven composite task engine with a
//!   recycling pool
//! - **[`protocol`]** - scope parsing, inbound events, outbound messages
//! - **[`router`]** - per-method route tables, path-parameter trie, 404/405
//! - **[`route`]** - routes, declared inputs, response cache
//! - **[`errors`]** - status hashing, reason phrases, error-handler tables
//! - **[`results`]** - handler result shapes and normalisation
//! - **[`context`]** / **[`websocket`]** - synthetic handler inputs
//! - **[`app`]** - the application aggregate and request lifecycle
//! - **[`config`]**, **[`logging`]**, **[`ids`]** - configuration, tracing
//!   setup, request ids
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host
//!     participant App as app::App
//!     participant Router as router::RouteTable
//!     participant Task as awaitable::Task
//!     participant Handler
//!
//!     Host->>App: call(scope, receive, send)
//!     App->>Router: resolve(method, path)
//!     Router-->>App: Found / MethodNotAllowed / NotFound
//!     App->>Task: queue receive (body) or handler step
//!     Host->>Task: await
//!     Task->>Host: receive() body chunks
//!     Task->>Handler: call(args)
//!     Handler-->>Task: HandlerResult
//!     Task->>Host: send(http.response.start)
//!     Task->>Host: send(http.response.body)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use viewcore::app::App;
//! use viewcore::config::AppConfig;
//! use viewcore::results::HandlerResult;
//! use viewcore::route::{handler, Args, ParsedInput, RouteInput, RouteSpec};
//! use viewcore::typecode::TypeNode;
//!
//! let mut app = App::new(&AppConfig::default()).unwrap();
//! app.get(
//!     "/items/{id}",
//!     RouteSpec::new(handler(|args: Args| async move {
//!         let id = args.str(0).unwrap_or_default().to_owned();
//!         let verbose = args.value(1).and_then(|v| v.as_bool()).unwrap_or(false);
//!         anyhow::Ok(HandlerResult::from(format!("item {id} verbose={verbose}")))
//!     }))
//!     .input(RouteInput::Parsed(ParsedInput::query("verbose", vec![TypeNode::Bool]))),
//! )
//! .unwrap();
//! let app = Arc::new(app);
//! # let _ = app;
//! ```
//!
//! ## Error Handling
//!
//! Handlers return `anyhow::Result`. Returning an [`errors::HttpError`]
//! answers with its status; other error types can be mapped with
//! [`app::App::exception_handler`]; anything else becomes a 500 (or a 1006
//! close on WebSocket routes).

pub mod app;
pub mod array;
pub mod awaitable;
pub mod config;
pub mod context;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod map;
pub mod parsers;
pub mod protocol;
pub mod results;
pub mod route;
pub mod router;
pub mod typecode;
pub mod value;
pub mod websocket;

pub use app::{App, DispatchError};
pub use errors::HttpError;
pub use results::HandlerResult;
pub use route::{handler, Args, RouteSpec};
pub use value::Value;
