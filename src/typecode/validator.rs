use super::build::{build_type_codes, ClassRegistry, DescriptorError};
use super::cast::{cast, CastError};
use super::node::TypeNode;
use crate::parsers::{JsonParser, SerdeJsonParser};
use crate::value::Value;
use std::sync::Arc;

/// A union compiled once and reused to check or cast many values.
#[derive(Clone)]
pub struct TypeValidator {
    types: Arc<[TypeNode]>,
    json: Arc<dyn JsonParser>,
}

impl TypeValidator {
    pub fn new(types: Vec<TypeNode>, json: Arc<dyn JsonParser>) -> Self {
        Self {
            types: types.into(),
            json,
        }
    }

    /// Compile a host descriptor list with the default JSON parser.
    pub fn compile(descriptors: &serde_json::Value, classes: &ClassRegistry) -> Result<Self, DescriptorError> {
        Ok(Self::new(
            build_type_codes(descriptors, classes)?,
            Arc::new(SerdeJsonParser),
        ))
    }

    #[must_use]
    pub fn types(&self) -> &[TypeNode] {
        &self.types
    }

    /// True when `value` already is one of the union's types (no coercion).
    #[must_use]
    pub fn check_type(&self, value: &Value) -> bool {
        cast(&self.types, value, self.json.as_ref(), false).is_ok()
    }

    /// True when `value` can be coerced into the union.
    #[must_use]
    pub fn is_compatible(&self, value: &Value) -> bool {
        cast(&self.types, value, self.json.as_ref(), true).is_ok()
    }

    /// Coerce `value` into the union.
    pub fn cast(&self, value: &Value) -> Result<Value, CastError> {
        cast(&self.types, value, self.json.as_ref(), true)
    }
}

impl std::fmt::Debug for TypeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeValidator")
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_versus_compatible() {
        let validator = TypeValidator::compile(&json!([[1, null, []], [2, null, []]]), &ClassRegistry::new())
            .unwrap();
        assert!(validator.is_compatible(&Value::from("1")));
        assert!(validator.check_type(&Value::from("1")));
        assert!(validator.check_type(&Value::Int(1)));
        assert!(!validator.check_type(&Value::Float(1.0)));
        assert_eq!(validator.cast(&Value::from("1")).unwrap(), Value::Int(1));
    }
}
