use super::node::{ClassField, ClassTarget, FieldDefault, TypeNode};
use crate::parsers::JsonParser;
use crate::value::{Dict, Value};
use std::fmt;
use tracing::trace;

/// Why a cast attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum CastErrorKind {
    /// Casting disabled and the value is not exactly the expected type.
    NotExact { expected: &'static str, got: &'static str },
    /// The value could not be coerced into the expected type.
    Unconvertible { expected: &'static str, got: String },
    /// String could not be parsed as a number.
    InvalidNumber { expected: &'static str, input: String },
    NotBoolLike(String),
    InvalidJson(String),
    ExpectedArray(String),
    ExpectedObject(String),
    MissingKey(String),
    ExpectedString,
    /// The class constructor rejected the collected arguments.
    Construct { class: String, message: String },
}

/// Typed validation error carrying the path to the offending value.
#[derive(Debug, Clone, PartialEq)]
pub struct CastError {
    kind: CastErrorKind,
    path: Vec<String>,
}

impl CastError {
    pub(crate) fn new(kind: CastErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &CastErrorKind {
        &self.kind
    }

    /// Dotted path to the failing value (`""` at the top level).
    #[must_use]
    pub fn path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            if !segment.starts_with('[') && !out.is_empty() {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }

    fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

impl fmt::Display for CastErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastErrorKind::NotExact { expected, got } => {
                write!(f, "Got non-{expected} ({got}) without casting enabled")
            }
            CastErrorKind::Unconvertible { expected, got } => {
                write!(f, "cannot convert {got} to {expected}")
            }
            CastErrorKind::InvalidNumber { expected, input } => {
                write!(f, "invalid literal for {expected}: {input:?}")
            }
            CastErrorKind::NotBoolLike(v) => write!(f, "Not bool-like: {v}"),
            CastErrorKind::InvalidJson(msg) => write!(f, "invalid JSON: {msg}"),
            CastErrorKind::ExpectedArray(v) => write!(f, "Expected array, got {v}"),
            CastErrorKind::ExpectedObject(v) => write!(f, "Expected object, got {v}"),
            CastErrorKind::MissingKey(k) => write!(f, "Missing key: {k}"),
            CastErrorKind::ExpectedString => f.write_str("Expected string"),
            CastErrorKind::Construct { class, message } => {
                write!(f, "failed to construct {class}: {message}")
            }
        }
    }
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} (at {})", self.kind, self.path())
        }
    }
}

impl std::error::Error for CastError {}

fn err(kind: CastErrorKind) -> CastError {
    CastError::new(kind)
}

fn not_exact(expected: &'static str, value: &Value) -> CastError {
    err(CastErrorKind::NotExact {
        expected,
        got: value.type_name(),
    })
}

/// Cast `value` against the union `types`.
///
/// Members are tried in declaration order; the first one that accepts the
/// value wins. `Any` anywhere in the union accepts the value unchanged. With
/// `allow_casting`, `Str` and `None` only apply as fallbacks once every other
/// member has failed. An empty union behaves like `Any`.
pub fn cast(
    types: &[TypeNode],
    value: &Value,
    json: &dyn JsonParser,
    allow_casting: bool,
) -> Result<Value, CastError> {
    if types.is_empty() || types.iter().any(|node| matches!(node, TypeNode::Any)) {
        return Ok(value.clone());
    }

    let mut string_allowed = false;
    let mut null_allowed = false;
    let mut last_error: Option<CastError> = None;

    for node in types {
        let attempt = match node {
            TypeNode::Any => continue,
            TypeNode::Str => {
                if allow_casting {
                    string_allowed = true;
                    continue;
                }
                match value {
                    Value::Str(_) => Ok(value.clone()),
                    other => Err(not_exact("string", other)),
                }
            }
            TypeNode::None => {
                if allow_casting {
                    null_allowed = true;
                    continue;
                }
                match value {
                    Value::Null => Ok(Value::Null),
                    other => Err(not_exact("None", other)),
                }
            }
            TypeNode::Int => cast_int(value, allow_casting),
            TypeNode::Bool => cast_bool(value, allow_casting),
            TypeNode::Float => cast_float(value, allow_casting),
            TypeNode::Dict(children) => cast_dict(children, value, json, allow_casting),
            TypeNode::List(children) => cast_list(children, value, json, allow_casting),
            TypeNode::Class { target, fields } => {
                cast_class(target.as_ref(), fields, value, json, allow_casting)
            }
        };

        match attempt {
            Ok(v) => return Ok(v),
            Err(e) => {
                trace!(code = node.code(), error = %e, "typecode member rejected value");
                last_error = Some(e);
            }
        }
    }

    if null_allowed && value.is_null() {
        return Ok(Value::Null);
    }

    if string_allowed {
        return match value {
            Value::Str(_) => Ok(value.clone()),
            _ => Err(last_error.unwrap_or_else(|| err(CastErrorKind::ExpectedString))),
        };
    }

    Err(last_error.unwrap_or_else(|| err(CastErrorKind::ExpectedString)))
}

fn cast_int(value: &Value, allow_casting: bool) -> Result<Value, CastError> {
    match value {
        Value::Int(_) => Ok(value.clone()),
        other if !allow_casting => Err(not_exact("int", other)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                err(CastErrorKind::InvalidNumber {
                    expected: "int",
                    input: s.clone(),
                })
            }),
        other => Err(err(CastErrorKind::Unconvertible {
            expected: "int",
            got: other.to_string(),
        })),
    }
}

fn cast_bool(value: &Value, allow_casting: bool) -> Result<Value, CastError> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        other if !allow_casting => Err(not_exact("bool", other)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Str(s) if s == "true" => Ok(Value::Bool(true)),
        Value::Str(s) if s == "false" => Ok(Value::Bool(false)),
        other => Err(err(CastErrorKind::NotBoolLike(other.to_string()))),
    }
}

fn cast_float(value: &Value, allow_casting: bool) -> Result<Value, CastError> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        other if !allow_casting => Err(not_exact("float", other)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| {
                err(CastErrorKind::InvalidNumber {
                    expected: "float",
                    input: s.clone(),
                })
            }),
        other => Err(err(CastErrorKind::Unconvertible {
            expected: "float",
            got: other.to_string(),
        })),
    }
}

/// Decode a string (or bytes) value as JSON.
fn decode_json(value: &Value, json: &dyn JsonParser) -> Result<Value, CastError> {
    let text = match value {
        Value::Str(s) => s.as_str(),
        Value::Bytes(b) => std::str::from_utf8(b)
            .map_err(|e| err(CastErrorKind::InvalidJson(e.to_string())))?,
        other => {
            return Err(err(CastErrorKind::Unconvertible {
                expected: "JSON text",
                got: other.to_string(),
            }))
        }
    };
    json.parse(text)
        .map_err(|e| err(CastErrorKind::InvalidJson(e.to_string())))
}

fn cast_dict(
    children: &[TypeNode],
    value: &Value,
    json: &dyn JsonParser,
    allow_casting: bool,
) -> Result<Value, CastError> {
    let decoded;
    let dict = match value {
        Value::Dict(d) => d,
        other if !allow_casting => return Err(not_exact("dict", other)),
        other => {
            decoded = decode_json(other, json)?;
            decoded
                .as_dict()
                .ok_or_else(|| err(CastErrorKind::ExpectedObject(decoded.to_string())))?
        }
    };

    let mut out = Dict::new();
    for (key, item) in dict {
        let casted = cast(children, item, json, true).map_err(|e| e.within(key.clone()))?;
        out.insert(key.clone(), casted);
    }
    Ok(Value::Dict(out))
}

fn cast_list(
    children: &[TypeNode],
    value: &Value,
    json: &dyn JsonParser,
    allow_casting: bool,
) -> Result<Value, CastError> {
    let decoded;
    let items = match value {
        Value::List(items) => items,
        other if !allow_casting => return Err(not_exact("list", other)),
        other => {
            decoded = decode_json(other, json)?;
            decoded
                .as_list()
                .ok_or_else(|| err(CastErrorKind::ExpectedArray(decoded.to_string())))?
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        out.push(cast(children, item, json, true).map_err(|e| e.within(format!("[{index}]")))?);
    }
    Ok(Value::List(out))
}

fn cast_class(
    target: &dyn ClassTarget,
    fields: &[ClassField],
    value: &Value,
    json: &dyn JsonParser,
    allow_casting: bool,
) -> Result<Value, CastError> {
    if let Value::Object(obj) = value {
        if obj.class() == target.name() {
            return Ok(value.clone());
        }
    }
    if !allow_casting {
        return Err(err(CastErrorKind::NotExact {
            expected: "instance",
            got: value.type_name(),
        }));
    }

    let decoded;
    let source = match value {
        Value::Dict(d) => d,
        other => {
            decoded = decode_json(other, json)?;
            decoded
                .as_dict()
                .ok_or_else(|| err(CastErrorKind::ExpectedObject(decoded.to_string())))?
        }
    };

    let mut kwargs = Dict::new();
    for field in fields {
        let raw = match source.get(&field.name) {
            Some(v) => v.clone(),
            None => match &field.default {
                FieldDefault::NotRequired => continue,
                FieldDefault::Default(default) => default.resolve(),
                FieldDefault::Required => {
                    return Err(err(CastErrorKind::MissingKey(field.name.clone())))
                }
            },
        };
        let casted = cast(&field.types, &raw, json, allow_casting)
            .map_err(|e| e.within(field.name.clone()))?;
        kwargs.insert(field.name.clone(), casted);
    }

    let built = match target.construct(&kwargs) {
        Some(result) => result,
        None => target.instantiate(kwargs),
    };
    built.map_err(|message| {
        err(CastErrorKind::Construct {
            class: target.name().to_owned(),
            message,
        })
    })
}
