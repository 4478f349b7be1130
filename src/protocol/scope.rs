use super::ProtocolError;
use crate::value::Value;
use smallvec::SmallVec;

/// Inline capacity for request header lists.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header name/value byte pairs as they arrive from the transport.
pub type RequestHeaders = SmallVec<[(Vec<u8>, Vec<u8>); MAX_INLINE_HEADERS]>;

/// Connection type carried in the scope's `type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Lifespan,
    Http,
    WebSocket,
}

impl ScopeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Lifespan => "lifespan",
            ScopeKind::Http => "http",
            ScopeKind::WebSocket => "websocket",
        }
    }
}

/// A parsed connection scope.
///
/// Only the keys the dispatcher needs are lifted out; the original mapping is
/// kept for the request context.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub path: String,
    /// Request method; `None` for lifespan and WebSocket scopes.
    pub method: Option<String>,
    pub query_string: String,
    pub headers: RequestHeaders,
    raw: Value,
}

impl Scope {
    /// Parse a scope mapping.
    ///
    /// HTTP scopes require `path`, `method`, `query_string` and `headers`;
    /// WebSocket scopes require the same minus `method`.
    pub fn parse(raw: Value) -> Result<Self, ProtocolError> {
        let kind = match required_str(&raw, "type")? {
            "lifespan" => ScopeKind::Lifespan,
            "http" => ScopeKind::Http,
            "websocket" => ScopeKind::WebSocket,
            other => return Err(ProtocolError::UnknownScope(other.to_owned())),
        };

        if kind == ScopeKind::Lifespan {
            return Ok(Self {
                kind,
                path: String::new(),
                method: None,
                query_string: String::new(),
                headers: RequestHeaders::new(),
                raw,
            });
        }

        let path = required_str(&raw, "path")?.to_owned();
        let method = match kind {
            ScopeKind::Http => Some(required_str(&raw, "method")?.to_owned()),
            _ => None,
        };
        let query_string = match required(&raw, "query_string")? {
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Str(s) => s.clone(),
            other => {
                return Err(ProtocolError::BadMessage(format!(
                    "query_string must be bytes, got {}",
                    other.type_name()
                )))
            }
        };
        let headers = parse_headers(required(&raw, "headers")?)?;

        Ok(Self {
            kind,
            path,
            method,
            query_string,
            headers,
            raw,
        })
    }

    /// The untouched scope mapping.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// First header with `name` (compared case-insensitively), decoded lossily.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, v)| String::from_utf8_lossy(v).into_owned())
    }
}

pub(crate) fn required<'a>(raw: &'a Value, key: &'static str) -> Result<&'a Value, ProtocolError> {
    raw.get(key).ok_or(ProtocolError::MissingKey(key))
}

pub(crate) fn required_str<'a>(raw: &'a Value, key: &'static str) -> Result<&'a str, ProtocolError> {
    required(raw, key)?.as_str().ok_or_else(|| {
        ProtocolError::BadMessage(format!("'{key}' must be a string"))
    })
}

fn header_bytes(value: &Value) -> Result<Vec<u8>, ProtocolError> {
    value
        .as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| ProtocolError::BadMessage("header entries must be bytes".to_owned()))
}

fn parse_headers(value: &Value) -> Result<RequestHeaders, ProtocolError> {
    let entries = value
        .as_list()
        .ok_or_else(|| ProtocolError::BadMessage("headers must be a list".to_owned()))?;
    entries
        .iter()
        .map(|entry| match entry.as_list() {
            Some([name, value]) => Ok((header_bytes(name)?, header_bytes(value)?)),
            _ => Err(ProtocolError::BadMessage(
                "header entries must be two-element pairs".to_owned(),
            )),
        })
        .collect()
}
