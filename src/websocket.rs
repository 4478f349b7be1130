//! # WebSocket Module
//!
//! [`WebSocket`] is the handle a WebSocket route receives when it declares the
//! WebSocket input. It wraps the transport's receive and send collaborators:
//!
//! - [`accept`](WebSocket::accept) expects `websocket.connect` and answers
//!   with `websocket.accept`
//! - [`receive`](WebSocket::receive) yields text or bytes, or `None` once the
//!   peer has disconnected
//! - [`send`](WebSocket::send) writes a text or binary frame
//! - [`close`](WebSocket::close) sends `websocket.close`; afterwards every
//!   other operation fails
//!
//! Handles are cheap to clone and share their connection state.

use crate::protocol::{message_type, Outbound, Payload, ProtocolError, Receiver, Sender};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const OPEN: u8 = 0;
const CLOSED: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Close code used when none is given.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Failure of a WebSocket operation.
#[derive(Debug)]
pub enum WebSocketError {
    /// The connection was closed by this side.
    Closed,
    /// `close` was called twice.
    AlreadyClosed,
    /// `accept` saw something other than `websocket.connect`.
    NotConnect,
    /// `receive` saw something other than `websocket.receive`.
    NotReceive,
    /// A frame payload that is neither text nor bytes. Carries the rendered value.
    BadPayload(String),
    Protocol(ProtocolError),
    /// The transport's receive or send failed.
    Transport(anyhow::Error),
}

impl fmt::Display for WebSocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebSocketError::Closed => f.write_str("websocket has been closed"),
            WebSocketError::AlreadyClosed => f.write_str("websocket is already closed or closing"),
            WebSocketError::NotConnect => f.write_str(
                "received message was not websocket.connect (was accept() already called?)",
            ),
            WebSocketError::NotReceive => f.write_str(
                "received message was not websocket.receive (did you forget to call accept()?)",
            ),
            WebSocketError::BadPayload(got) => write!(f, "expected string or bytes, got {got}"),
            WebSocketError::Protocol(e) => write!(f, "{e}"),
            WebSocketError::Transport(e) => write!(f, "websocket transport failed: {e:#}"),
        }
    }
}

impl std::error::Error for WebSocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WebSocketError::Protocol(e) => Some(e),
            WebSocketError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<ProtocolError> for WebSocketError {
    fn from(err: ProtocolError) -> Self {
        WebSocketError::Protocol(err)
    }
}

/// A WebSocket connection.
#[derive(Clone)]
pub struct WebSocket {
    receiver: Arc<dyn Receiver>,
    sender: Arc<dyn Sender>,
    state: Arc<AtomicU8>,
}

impl WebSocket {
    pub fn new(receiver: Arc<dyn Receiver>, sender: Arc<dyn Sender>) -> Self {
        Self {
            receiver,
            sender,
            state: Arc::new(AtomicU8::new(OPEN)),
        }
    }

    /// True once this side closed the connection.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    fn ensure_open(&self) -> Result<(), WebSocketError> {
        if self.is_closed() {
            Err(WebSocketError::Closed)
        } else {
            Ok(())
        }
    }

    async fn next_event(&self) -> Result<Option<Value>, WebSocketError> {
        let event = self
            .receiver
            .receive()
            .await
            .map_err(WebSocketError::Transport)?;
        if message_type(&event)? == "websocket.disconnect" {
            debug!("websocket peer disconnected");
            self.state.store(DISCONNECTED, Ordering::Release);
            return Ok(None);
        }
        Ok(Some(event))
    }

    async fn send_message(&self, message: Outbound) -> Result<(), WebSocketError> {
        self.sender
            .send(message)
            .await
            .map_err(WebSocketError::Transport)
    }

    /// Complete the handshake. A peer that disconnects first is not an error.
    pub async fn accept(&self) -> Result<(), WebSocketError> {
        self.ensure_open()?;
        let Some(event) = self.next_event().await? else {
            return Ok(());
        };
        if message_type(&event)? != "websocket.connect" {
            return Err(WebSocketError::NotConnect);
        }
        self.send_message(Outbound::WebSocketAccept).await
    }

    /// Next frame from the peer; `None` once the peer disconnected.
    pub async fn receive(&self) -> Result<Option<Payload>, WebSocketError> {
        self.ensure_open()?;
        if self.state.load(Ordering::Acquire) == DISCONNECTED {
            return Ok(None);
        }
        let Some(event) = self.next_event().await? else {
            return Ok(None);
        };
        if message_type(&event)? != "websocket.receive" {
            return Err(WebSocketError::NotReceive);
        }
        match (event.get("text"), event.get("bytes")) {
            (Some(Value::Str(text)), _) => Ok(Some(Payload::Text(text.clone()))),
            (_, Some(Value::Bytes(bytes))) => Ok(Some(Payload::Bytes(bytes.clone()))),
            _ => Err(ProtocolError::BadMessage(
                "websocket.receive carries neither text nor bytes".to_owned(),
            )
            .into()),
        }
    }

    pub async fn send(&self, payload: impl Into<Payload>) -> Result<(), WebSocketError> {
        self.ensure_open()?;
        self.send_message(Outbound::WebSocketSend(payload.into())).await
    }

    /// Send a dynamic value, which must be a string or bytes.
    pub async fn send_value(&self, value: &Value) -> Result<(), WebSocketError> {
        let payload = match value {
            Value::Str(text) => Payload::Text(text.clone()),
            Value::Bytes(bytes) => Payload::Bytes(bytes.clone()),
            other => return Err(WebSocketError::BadPayload(other.to_string())),
        };
        self.send(payload).await
    }

    /// Send `websocket.close`. The handle is closed even if sending fails.
    pub async fn close(&self, code: u16, reason: Option<String>) -> Result<(), WebSocketError> {
        if self.state.swap(CLOSED, Ordering::AcqRel) == CLOSED {
            return Err(WebSocketError::AlreadyClosed);
        }
        self.send_message(Outbound::WebSocketClose { code, reason }).await
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            OPEN => "open",
            CLOSED => "closed",
            _ => "disconnected",
        };
        f.debug_struct("WebSocket").field("state", &state).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dict;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn event(kind: &str, extra: Option<(&str, Value)>) -> Value {
        let mut map = Dict::new();
        map.insert("type".into(), Value::from(kind));
        if let Some((key, value)) = extra {
            map.insert(key.into(), value);
        }
        Value::Dict(map)
    }

    fn socket(events: Vec<Value>) -> (WebSocket, Arc<Mutex<Vec<Outbound>>>) {
        let queue = Arc::new(Mutex::new(VecDeque::from(events)));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let receiver = {
            let queue = Arc::clone(&queue);
            move || {
                let next = queue.lock().pop_front();
                async move { next.ok_or_else(|| anyhow::anyhow!("no more events")) }
            }
        };
        let sender = {
            let sent = Arc::clone(&sent);
            move |message: Outbound| {
                sent.lock().push(message);
                async { anyhow::Ok(()) }
            }
        };
        (WebSocket::new(Arc::new(receiver), Arc::new(sender)), sent)
    }

    #[tokio::test]
    async fn test_accept_receive_send_close() {
        let (ws, sent) = socket(vec![
            event("websocket.connect", None),
            event("websocket.receive", Some(("text", Value::from("ping")))),
        ]);
        ws.accept().await.unwrap();
        assert_eq!(ws.receive().await.unwrap(), Some(Payload::Text("ping".into())));
        ws.send("pong").await.unwrap();
        ws.close(NORMAL_CLOSURE, None).await.unwrap();

        let sent = sent.lock();
        assert_eq!(sent[0], Outbound::WebSocketAccept);
        assert_eq!(sent[1], Outbound::WebSocketSend(Payload::Text("pong".into())));
        assert_eq!(sent[2], Outbound::WebSocketClose { code: 1000, reason: None });
    }

    #[tokio::test]
    async fn test_disconnect_is_none() {
        let (ws, _) = socket(vec![
            event("websocket.connect", None),
            event("websocket.disconnect", None),
        ]);
        ws.accept().await.unwrap();
        assert_eq!(ws.receive().await.unwrap(), None);
        assert_eq!(ws.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_receive_before_accept() {
        let (ws, _) = socket(vec![event("websocket.connect", None)]);
        let err = ws.receive().await.unwrap_err();
        assert!(matches!(err, WebSocketError::NotReceive));
        assert!(err.to_string().contains("did you forget to call accept()"));
    }

    #[tokio::test]
    async fn test_operations_after_close() {
        let (ws, _) = socket(vec![]);
        ws.close(1001, Some("bye".into())).await.unwrap();
        assert_eq!(ws.send("x").await.unwrap_err().to_string(), "websocket has been closed");
        assert_eq!(
            ws.close(1000, None).await.unwrap_err().to_string(),
            "websocket is already closed or closing"
        );
    }

    #[tokio::test]
    async fn test_send_value_rejects_other_types() {
        let (ws, _) = socket(vec![]);
        let err = ws.send_value(&Value::Int(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "expected string or bytes, got 1");
    }
}
