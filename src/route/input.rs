use crate::typecode::{build_type_codes, ClassRegistry, DefaultValue, DescriptorError, TypeNode};
use crate::value::Value;
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;

/// Descriptor code selecting the request-context input.
pub const CONTEXT_INPUT: i64 = 1;
/// Descriptor code selecting the WebSocket input.
pub const WEBSOCKET_INPUT: i64 = 2;

/// Predicate run on a cast input value; `false` rejects the request with a 400.
pub type InputValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named handler parameter read from the query string or the JSON body.
#[derive(Clone)]
pub struct ParsedInput {
    pub name: String,
    pub is_body: bool,
    pub types: Vec<TypeNode>,
    pub default: Option<DefaultValue>,
    pub validators: Vec<InputValidator>,
}

impl ParsedInput {
    pub fn query(name: impl Into<String>, types: Vec<TypeNode>) -> Self {
        Self {
            name: name.into(),
            is_body: false,
            types,
            default: None,
            validators: Vec::new(),
        }
    }

    pub fn body(name: impl Into<String>, types: Vec<TypeNode>) -> Self {
        Self {
            is_body: true,
            ..Self::query(name, types)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn validator(mut self, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validators.push(Arc::new(check));
        self
    }
}

impl fmt::Debug for ParsedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedInput")
            .field("name", &self.name)
            .field("is_body", &self.is_body)
            .field("types", &self.types)
            .field("default", &self.default)
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// One declared handler input.
#[derive(Debug, Clone)]
pub enum RouteInput {
    /// The request context.
    Context,
    /// The WebSocket handle.
    WebSocket,
    Parsed(ParsedInput),
}

impl RouteInput {
    /// True when this input is read from the request body.
    #[must_use]
    pub fn is_body(&self) -> bool {
        matches!(self, RouteInput::Parsed(input) if input.is_body)
    }

    /// Load an input from its host descriptor.
    ///
    /// An integer selects a synthetic input. A mapping must carry `name`,
    /// `is_body`, `has_default` and `type_codes`, plus `default` when
    /// `has_default` is true.
    pub fn from_descriptor(descriptor: &Json, classes: &ClassRegistry) -> Result<Self, DescriptorError> {
        if let Some(code) = descriptor.as_i64() {
            return match code {
                CONTEXT_INPUT => Ok(RouteInput::Context),
                WEBSOCKET_INPUT => Ok(RouteInput::WebSocket),
                other => Err(DescriptorError::UnknownCode(other)),
            };
        }

        let map = descriptor
            .as_object()
            .ok_or_else(|| DescriptorError::MalformedEntry(descriptor.to_string()))?;
        let key = |name: &'static str| map.get(name).ok_or(DescriptorError::MissingKey(name));

        let is_body = key("is_body")?.as_bool().unwrap_or(false);
        let name = key("name")?.as_str().ok_or(DescriptorError::ExpectedName)?;
        let has_default = key("has_default")?.as_bool().unwrap_or(false);
        let types = build_type_codes(key("type_codes")?, classes)?;
        let default = if has_default {
            Some(DefaultValue::Value(Value::from(key("default")?.clone())))
        } else {
            None
        };

        Ok(RouteInput::Parsed(ParsedInput {
            name: name.to_owned(),
            is_body,
            types,
            default,
            validators: Vec::new(),
        }))
    }
}
