use crate::value::{Dict, Value};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// One response header as raw bytes.
pub type Header = (Vec<u8>, Vec<u8>);

/// Shared response header list (cached responses reuse the same list).
pub type Headers = Arc<[Header]>;

/// Text or binary payload of a WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

/// A message handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// `http.response.start`, or `websocket.http.response.start` when rejecting a handshake.
    ResponseStart {
        status: u16,
        headers: Headers,
        websocket: bool,
    },
    /// `http.response.body`, or `websocket.http.response.body`.
    ResponseBody { body: Arc<[u8]>, websocket: bool },
    WebSocketAccept,
    WebSocketSend(Payload),
    WebSocketClose { code: u16, reason: Option<String> },
    LifespanStartupComplete,
    LifespanShutdownComplete,
}

impl Outbound {
    /// The `type` key of the message.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            Outbound::ResponseStart { websocket: false, .. } => "http.response.start",
            Outbound::ResponseStart { websocket: true, .. } => "websocket.http.response.start",
            Outbound::ResponseBody { websocket: false, .. } => "http.response.body",
            Outbound::ResponseBody { websocket: true, .. } => "websocket.http.response.body",
            Outbound::WebSocketAccept => "websocket.accept",
            Outbound::WebSocketSend(_) => "websocket.send",
            Outbound::WebSocketClose { .. } => "websocket.close",
            Outbound::LifespanStartupComplete => "lifespan.startup.complete",
            Outbound::LifespanShutdownComplete => "lifespan.shutdown.complete",
        }
    }

    /// Render as a protocol mapping for hosts that exchange plain dictionaries.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = Dict::new();
        out.insert("type".to_owned(), Value::from(self.message_type()));
        match self {
            Outbound::ResponseStart { status, headers, .. } => {
                out.insert("status".to_owned(), Value::Int(i64::from(*status)));
                out.insert(
                    "headers".to_owned(),
                    Value::List(
                        headers
                            .iter()
                            .map(|(k, v)| Value::List(vec![Value::Bytes(k.clone()), Value::Bytes(v.clone())]))
                            .collect(),
                    ),
                );
            }
            Outbound::ResponseBody { body, .. } => {
                out.insert("body".to_owned(), Value::Bytes(body.to_vec()));
            }
            Outbound::WebSocketSend(Payload::Text(text)) => {
                out.insert("text".to_owned(), Value::from(text.as_str()));
            }
            Outbound::WebSocketSend(Payload::Bytes(bytes)) => {
                out.insert("bytes".to_owned(), Value::Bytes(bytes.clone()));
            }
            Outbound::WebSocketClose { code, reason } => {
                out.insert("code".to_owned(), Value::Int(i64::from(*code)));
                if let Some(reason) = reason {
                    out.insert("reason".to_owned(), Value::from(reason.as_str()));
                }
            }
            Outbound::WebSocketAccept
            | Outbound::LifespanStartupComplete
            | Outbound::LifespanShutdownComplete => {}
        }
        Value::Dict(out)
    }
}

/// The transport's `receive` callable.
pub trait Receiver: Send + Sync {
    fn receive(&self) -> BoxFuture<'static, anyhow::Result<Value>>;
}

/// The transport's `send` callable.
pub trait Sender: Send + Sync {
    fn send(&self, message: Outbound) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> Receiver for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn receive(&self) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(self())
    }
}

impl<F, Fut> Sender for F
where
    F: Fn(Outbound) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn send(&self, message: Outbound) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self(message))
    }
}
