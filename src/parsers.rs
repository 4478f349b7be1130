//! Query-string and JSON parsers supplied to the dispatch core.
//!
//! The application owns one [`Parsers`] bundle. Defaults are provided
//! ([`FormQueryParser`] and [`SerdeJsonParser`]); a host can swap either one
//! with [`crate::app::App::set_parsers`].

use crate::value::{Dict, Value};
use std::fmt;
use std::sync::Arc;

/// Failure reported by a parser. The message is surfaced in cast errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

/// Decodes JSON text into a [`Value`].
pub trait JsonParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Value, ParseError>;
}

/// Decodes a raw query string into a mapping of names to values.
pub trait QueryParser: Send + Sync {
    fn parse(&self, query: &str) -> Result<Dict, ParseError>;
}

/// [`JsonParser`] backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeJsonParser;

impl JsonParser for SerdeJsonParser {
    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| ParseError::new(e.to_string()))
    }
}

/// `application/x-www-form-urlencoded` query parser.
///
/// Every value is kept as a string (casting happens later in the typecode
/// engine). Repeated names keep the last occurrence.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormQueryParser;

impl QueryParser for FormQueryParser {
    fn parse(&self, query: &str) -> Result<Dict, ParseError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Ok(url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), Value::Str(v.into_owned())))
            .collect())
    }
}

/// Parser pair held by the application.
#[derive(Clone)]
pub struct Parsers {
    pub query: Arc<dyn QueryParser>,
    pub json: Arc<dyn JsonParser>,
}

impl Default for Parsers {
    fn default() -> Self {
        Self {
            query: Arc::new(FormQueryParser),
            json: Arc::new(SerdeJsonParser),
        }
    }
}

impl fmt::Debug for Parsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsers").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parser_decodes_and_keeps_strings() {
        let parsed = FormQueryParser.parse("name=Al%20Bo&age=3&age=4").unwrap();
        assert_eq!(parsed.get("name"), Some(&Value::from("Al Bo")));
        assert_eq!(parsed.get("age"), Some(&Value::from("4")));
    }

    #[test]
    fn test_query_parser_empty() {
        assert!(FormQueryParser.parse("").unwrap().is_empty());
    }

    #[test]
    fn test_json_parser_reports_errors() {
        assert!(SerdeJsonParser.parse("{not json").is_err());
        assert_eq!(SerdeJsonParser.parse("[1]").unwrap(), Value::List(vec![Value::Int(1)]));
    }
}
