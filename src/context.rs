//! Request context handed to handlers that declare it as an input and to
//! [`ResultProducer`](crate::results::ResultProducer)s.

use crate::map::ViewMap;
use crate::protocol::{required, ProtocolError, Scope};
use crate::value::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// Initial capacity of the header map.
const HEADER_CAPACITY: usize = 8;

/// Host and port of one end of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub host: String,
    /// Absent for servers listening on a unix socket.
    pub port: Option<u16>,
}

impl Peer {
    /// The host as an IP address, when it is one.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }
}

/// Per-request metadata lifted from the connection scope.
#[derive(Debug)]
pub struct Context {
    pub scheme: String,
    pub http_version: String,
    pub method: Option<String>,
    pub path: String,
    pub client: Option<Peer>,
    pub server: Option<Peer>,
    headers: ViewMap<Vec<String>>,
    cookies: HashMap<String, String>,
}

impl Context {
    /// Build the context for a parsed scope.
    ///
    /// `scheme`, `http_version` and `path` are required. `client` and
    /// `server` may be absent or `null`, otherwise they must be a
    /// `[host, port]` pair.
    pub fn from_scope(scope: &Scope) -> Result<Self, ProtocolError> {
        let raw = scope.raw();
        let scheme = text(required(raw, "scheme")?, "scheme")?;
        let http_version = text(required(raw, "http_version")?, "http_version")?;

        let mut headers = ViewMap::new(HEADER_CAPACITY).map_err(bad_asgi)?;
        for (name, value) in &scope.headers {
            let name = String::from_utf8_lossy(name).to_ascii_lowercase();
            let value = String::from_utf8_lossy(value).into_owned();
            headers
                .get_or_insert_with(&name, Vec::new)
                .map_err(bad_asgi)?
                .push(value);
        }

        let cookies = headers
            .get("cookie")
            .map(|values| values.iter().flat_map(|v| parse_cookies(v)).collect())
            .unwrap_or_default();

        Ok(Self {
            scheme,
            http_version,
            method: scope.method.clone(),
            path: scope.path.clone(),
            client: peer(raw.get("client"), "client")?,
            server: peer(raw.get("server"), "server")?,
            headers,
            cookies,
        })
    }

    /// First value of a header. Names are matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).first().map(String::as_str)
    }

    /// Every value of a header, in arrival order.
    #[must_use]
    pub fn header_all(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers.iter().map(|(k, v)| (k, v.as_slice()))
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }
}

fn bad_asgi(err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::BadMessage(err.to_string())
}

fn text(value: &Value, key: &str) -> Result<String, ProtocolError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::BadMessage(format!("'{key}' must be a string")))
}

fn peer(value: Option<&Value>, key: &str) -> Result<Option<Peer>, ProtocolError> {
    let entry = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(entry) => entry,
    };
    match entry.as_list() {
        Some([host, port]) => {
            let host = text(host, key)?;
            let port = match port {
                Value::Null => None,
                Value::Int(port) => Some(u16::try_from(*port).map_err(|_| {
                    ProtocolError::BadMessage(format!("'{key}' port {port} is out of range"))
                })?),
                other => {
                    return Err(ProtocolError::BadMessage(format!(
                        "'{key}' port must be an int, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Some(Peer { host, port }))
        }
        _ => Err(ProtocolError::BadMessage(format!(
            "'{key}' must be a [host, port] pair"
        ))),
    }
}

/// Split a `cookie` header into name/value pairs.
fn parse_cookies(header: &str) -> impl Iterator<Item = (String, String)> + '_ {
    header.split(';').filter_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        let value = parts.next().unwrap_or("").trim();
        Some((name.to_owned(), value.to_owned()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dict;

    fn scope(extra: &[(&str, Value)]) -> Scope {
        let mut raw = Dict::new();
        raw.insert("type".into(), Value::from("http"));
        raw.insert("path".into(), Value::from("/items"));
        raw.insert("method".into(), Value::from("GET"));
        raw.insert("query_string".into(), Value::Bytes(Vec::new()));
        raw.insert("scheme".into(), Value::from("https"));
        raw.insert("http_version".into(), Value::from("1.1"));
        raw.insert(
            "headers".into(),
            Value::List(vec![
                Value::List(vec![Value::Bytes(b"Accept".to_vec()), Value::Bytes(b"a".to_vec())]),
                Value::List(vec![Value::Bytes(b"accept".to_vec()), Value::Bytes(b"b".to_vec())]),
                Value::List(vec![
                    Value::Bytes(b"cookie".to_vec()),
                    Value::Bytes(b"session=abc; theme=dark".to_vec()),
                ]),
            ]),
        );
        for (key, value) in extra {
            raw.insert((*key).to_owned(), value.clone());
        }
        Scope::parse(Value::Dict(raw)).unwrap()
    }

    #[test]
    fn test_headers_are_multi_valued_and_lowercase() {
        let ctx = Context::from_scope(&scope(&[])).unwrap();
        assert_eq!(ctx.header_all("ACCEPT"), ["a".to_owned(), "b".to_owned()]);
        assert_eq!(ctx.header("accept"), Some("a"));
        assert!(ctx.header("missing").is_none());
        assert_eq!(ctx.scheme, "https");
        assert_eq!(ctx.method.as_deref(), Some("GET"));
    }

    #[test]
    fn test_cookies_parsed() {
        let ctx = Context::from_scope(&scope(&[])).unwrap();
        assert_eq!(ctx.cookie("session"), Some("abc"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
    }

    #[test]
    fn test_client_pair() {
        let client = Value::List(vec![Value::from("127.0.0.1"), Value::Int(5000)]);
        let ctx = Context::from_scope(&scope(&[("client", client)])).unwrap();
        let client = ctx.client.unwrap();
        assert_eq!(client.port, Some(5000));
        assert!(client.ip().unwrap().is_loopback());
        assert!(ctx.server.is_none());
    }

    #[test]
    fn test_bad_client_is_protocol_error() {
        let client = Value::List(vec![Value::from("127.0.0.1")]);
        let err = Context::from_scope(&scope(&[("client", client)])).unwrap_err();
        assert!(matches!(err, ProtocolError::BadMessage(_)));
    }
}
