//! # Results Module
//!
//! Turns whatever a handler returned into the three parts of a response:
//! body bytes, status code and header list.
//!
//! A handler result is one of a closed set of shapes:
//!
//! - a body (`str` or `bytes`), sent as `200` with the default headers
//! - a tuple `(body[, status[, headers]])` of at most three elements
//! - a [`ResultProducer`], which is given the request [`Context`] and yields
//!   one of the other shapes
//! - nothing ([`HandlerResult::Empty`]), only meaningful for WebSocket routes
//!
//! Headers in a tuple are either a mapping (each name and value encoded as
//! UTF-8) or a raw list of byte pairs used verbatim. Without headers the
//! response carries `content-type: text/plain`.

use crate::context::Context;
use crate::protocol::{Header, Headers};
use crate::value::{Dict, Value};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Maximum number of elements in a tuple result.
pub const MAX_TUPLE_LEN: usize = 3;

/// Headers sent when a result does not carry any.
#[must_use]
pub fn default_headers() -> Headers {
    static DEFAULT: OnceLock<Headers> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| {
        Arc::from(vec![(b"content-type".to_vec(), b"text/plain".to_vec())])
    }))
}

/// Invalid handler return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    /// The body was neither `str` nor `bytes`. Carries the rendered value.
    Body(String),
    TooManyElements(usize),
    /// The second tuple element was not an integer status code.
    Status(String),
    /// The third tuple element was neither a mapping nor a raw header list.
    Headers(String),
    /// A [`ResultProducer`] reached normalisation without being resolved.
    Unresolved,
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultError::Body(got) => {
                write!(f, "expected a str or bytes response body, got {got}")
            }
            ResultError::TooManyElements(_) => {
                f.write_str("returned tuple should not exceed 3 elements")
            }
            ResultError::Status(got) => {
                write!(f, "expected second value of response to be an int, got {got}")
            }
            ResultError::Headers(got) => {
                write!(f, "expected third value of response to be a dict, got {got}")
            }
            ResultError::Unresolved => f.write_str("result producer was not resolved"),
        }
    }
}

impl std::error::Error for ResultError {}

/// What a [`ResultProducer`] yields.
pub enum Produced {
    Ready(HandlerResult),
    /// Resolved by awaiting; the output is normalised like a handler result.
    Pending(BoxFuture<'static, anyhow::Result<HandlerResult>>),
}

/// A return value that builds its response from the request context.
pub trait ResultProducer: Send {
    fn view_result(self: Box<Self>, context: &Context) -> Produced;
}

/// A handler's return value.
pub enum HandlerResult {
    /// `str` or `bytes` body.
    Body(Value),
    /// `(body[, status[, headers]])`.
    Tuple(Vec<Value>),
    Producer(Box<dyn ResultProducer>),
    Empty,
}

impl HandlerResult {
    pub fn producer(producer: impl ResultProducer + 'static) -> Self {
        HandlerResult::Producer(Box::new(producer))
    }

    /// A tuple result whose headers are a raw byte-pair list.
    pub fn with_raw_headers(body: impl Into<Value>, status: u16, headers: Vec<Header>) -> Self {
        let raw = headers
            .into_iter()
            .map(|(name, value)| Value::List(vec![Value::Bytes(name), Value::Bytes(value)]))
            .collect();
        HandlerResult::Tuple(vec![body.into(), Value::Int(i64::from(status)), Value::List(raw)])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, HandlerResult::Empty)
    }

    /// Split into body, status and headers.
    pub fn normalize(self) -> Result<Normalized, ResultError> {
        match self {
            HandlerResult::Body(body) => Ok(Normalized {
                status: 200,
                body: body_bytes(&body)?,
                headers: default_headers(),
            }),
            HandlerResult::Tuple(items) => normalize_tuple(items),
            HandlerResult::Producer(_) => Err(ResultError::Unresolved),
            HandlerResult::Empty => Err(ResultError::Body("None".to_owned())),
        }
    }

    /// Render as text for a WebSocket frame. Tuples use their body.
    pub fn into_payload(self) -> Result<crate::protocol::Payload, ResultError> {
        use crate::protocol::Payload;
        let body = match self {
            HandlerResult::Body(body) => body,
            HandlerResult::Tuple(mut items) if !items.is_empty() => items.swap_remove(0),
            HandlerResult::Tuple(_) => return Err(ResultError::Body("()".to_owned())),
            HandlerResult::Producer(_) => return Err(ResultError::Unresolved),
            HandlerResult::Empty => return Err(ResultError::Body("None".to_owned())),
        };
        match body {
            Value::Str(text) => Ok(Payload::Text(text)),
            Value::Bytes(bytes) => Ok(Payload::Bytes(bytes)),
            other => Err(ResultError::Body(other.to_string())),
        }
    }
}

impl fmt::Debug for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerResult::Body(body) => f.debug_tuple("Body").field(body).finish(),
            HandlerResult::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            HandlerResult::Producer(_) => f.write_str("Producer(..)"),
            HandlerResult::Empty => f.write_str("Empty"),
        }
    }
}

impl From<&str> for HandlerResult {
    fn from(body: &str) -> Self {
        HandlerResult::Body(Value::from(body))
    }
}

impl From<String> for HandlerResult {
    fn from(body: String) -> Self {
        HandlerResult::Body(Value::Str(body))
    }
}

impl From<Vec<u8>> for HandlerResult {
    fn from(body: Vec<u8>) -> Self {
        HandlerResult::Body(Value::Bytes(body))
    }
}

impl From<()> for HandlerResult {
    fn from((): ()) -> Self {
        HandlerResult::Empty
    }
}

impl<B: Into<Value>> From<(B, u16)> for HandlerResult {
    fn from((body, status): (B, u16)) -> Self {
        HandlerResult::Tuple(vec![body.into(), Value::Int(i64::from(status))])
    }
}

impl<B, K, V> From<(B, u16, Vec<(K, V)>)> for HandlerResult
where
    B: Into<Value>,
    K: Into<String>,
    V: Into<String>,
{
    fn from((body, status, headers): (B, u16, Vec<(K, V)>)) -> Self {
        let headers: Dict = headers
            .into_iter()
            .map(|(k, v)| (k.into(), Value::Str(v.into())))
            .collect();
        HandlerResult::Tuple(vec![body.into(), Value::Int(i64::from(status)), Value::Dict(headers)])
    }
}

/// Interpret a dynamic value as a result: `str`/`bytes` is a body, a list is
/// a tuple and `null` is empty.
impl TryFrom<Value> for HandlerResult {
    type Error = ResultError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(_) | Value::Bytes(_) => Ok(HandlerResult::Body(value)),
            Value::List(items) => Ok(HandlerResult::Tuple(items)),
            Value::Null => Ok(HandlerResult::Empty),
            other => Err(ResultError::Body(other.to_string())),
        }
    }
}

/// A response ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub status: u16,
    pub body: Arc<[u8]>,
    pub headers: Headers,
}

fn body_bytes(body: &Value) -> Result<Arc<[u8]>, ResultError> {
    match body {
        Value::Str(text) => Ok(Arc::from(text.as_bytes())),
        Value::Bytes(bytes) => Ok(Arc::from(bytes.as_slice())),
        other => Err(ResultError::Body(other.to_string())),
    }
}

fn normalize_tuple(items: Vec<Value>) -> Result<Normalized, ResultError> {
    if items.len() > MAX_TUPLE_LEN {
        return Err(ResultError::TooManyElements(items.len()));
    }
    let mut items = items.into_iter();
    let body = match items.next() {
        Some(body) => body_bytes(&body)?,
        None => return Err(ResultError::Body("()".to_owned())),
    };
    let status = match items.next() {
        None => 200,
        Some(Value::Int(code)) => {
            u16::try_from(code).map_err(|_| ResultError::Status(code.to_string()))?
        }
        Some(other) => return Err(ResultError::Status(other.to_string())),
    };
    let headers = match items.next() {
        None => default_headers(),
        Some(Value::List(raw)) => raw_headers(&raw)?,
        Some(Value::Dict(map)) => dict_headers(&map)?,
        Some(other) => return Err(ResultError::Headers(other.to_string())),
    };
    Ok(Normalized {
        status,
        body,
        headers,
    })
}

fn header_part(value: &Value) -> Option<Vec<u8>> {
    value.as_bytes().map(<[u8]>::to_vec)
}

fn raw_headers(raw: &[Value]) -> Result<Headers, ResultError> {
    raw.iter()
        .map(|entry| match entry.as_list() {
            Some([name, value]) => header_part(name)
                .zip(header_part(value))
                .ok_or_else(|| ResultError::Headers(entry.to_string())),
            _ => Err(ResultError::Headers(entry.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Arc::from)
}

fn dict_headers(map: &Dict) -> Result<Headers, ResultError> {
    map.iter()
        .map(|(name, value)| match value {
            Value::Str(text) => Ok((name.as_bytes().to_vec(), text.as_bytes().to_vec())),
            other => Err(ResultError::Headers(other.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Arc::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_body_defaults() {
        let out = HandlerResult::from("hello").normalize().unwrap();
        assert_eq!(out.status, 200);
        assert_eq!(&*out.body, b"hello");
        assert_eq!(out.headers, default_headers());
    }

    #[test]
    fn test_tuple_with_status_and_dict_headers() {
        let out = HandlerResult::from(("made", 201, vec![("x-id", "7")]))
            .normalize()
            .unwrap();
        assert_eq!(out.status, 201);
        assert_eq!(&*out.headers, &[(b"x-id".to_vec(), b"7".to_vec())]);
    }

    #[test]
    fn test_raw_header_list_is_verbatim() {
        let headers = vec![
            (b"set-cookie".to_vec(), b"a=1".to_vec()),
            (b"set-cookie".to_vec(), b"b=2".to_vec()),
        ];
        let out = HandlerResult::with_raw_headers("x", 200, headers.clone())
            .normalize()
            .unwrap();
        assert_eq!(&*out.headers, headers.as_slice());
    }

    #[test]
    fn test_validation_messages() {
        let too_long = HandlerResult::Tuple(vec![Value::from("a"); 4]).normalize().unwrap_err();
        assert_eq!(too_long.to_string(), "returned tuple should not exceed 3 elements");

        let status = HandlerResult::Tuple(vec![Value::from("a"), Value::from("200")])
            .normalize()
            .unwrap_err();
        assert_eq!(
            status.to_string(),
            "expected second value of response to be an int, got \"200\""
        );

        let headers = HandlerResult::Tuple(vec![Value::from("a"), Value::Int(200), Value::Int(1)])
            .normalize()
            .unwrap_err();
        assert!(matches!(headers, ResultError::Headers(_)));

        let body = HandlerResult::Body(Value::Int(3)).normalize().unwrap_err();
        assert_eq!(body.to_string(), "expected a str or bytes response body, got 3");
    }

    #[test]
    fn test_try_from_value() {
        assert!(matches!(HandlerResult::try_from(Value::Null), Ok(HandlerResult::Empty)));
        let out = HandlerResult::try_from(Value::List(vec![Value::from("x"), Value::Int(404)]))
            .unwrap()
            .normalize()
            .unwrap();
        assert_eq!(out.status, 404);
        assert!(HandlerResult::try_from(Value::Bool(true)).is_err());
    }

    #[test]
    fn test_payload_from_body() {
        use crate::protocol::Payload;
        assert_eq!(
            HandlerResult::from("hi").into_payload().unwrap(),
            Payload::Text("hi".to_owned())
        );
        assert_eq!(
            HandlerResult::from(vec![1u8, 2]).into_payload().unwrap(),
            Payload::Bytes(vec![1, 2])
        );
    }
}
