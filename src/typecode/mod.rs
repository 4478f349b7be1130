//! # Typecode Engine
//!
//! Runtime type checking and casting for untyped handler input (query-string
//! values and JSON bodies).
//!
//! ## Overview
//!
//! A handler parameter declares a *union* of [`TypeNode`]s. Casting walks
//! the union in declaration order and returns the first successful
//! interpretation:
//!
//! - `Any` accepts every value unchanged.
//! - `Int`, `Float` and `Bool` accept their exact type, or (with casting
//!   enabled) a string that parses into them. `Bool` also accepts `0`/`1`.
//! - `Dict` and `List` accept a native mapping/sequence, or a JSON string, and
//!   recursively cast each value/item against their child union.
//! - `Class` accepts an existing instance, or a mapping (native or JSON) whose
//!   declared fields are cast one by one and passed to the class constructor.
//! - `Str` and `None` are fallback-only when casting is enabled: they apply
//!   after every other member failed. `"42"` against `Str | Int` is `42`.
//!
//! ## Descriptors
//!
//! Hosts describe types as nested `[code, object, children, default]` arrays
//! (see [`build_type_codes`]). Class fields distinguish three default states
//! that change cast behaviour: required, concrete default and not required.
//!
//! ## Example
//!
//! ```rust
//! use viewcore::parsers::SerdeJsonParser;
//! use viewcore::typecode::{cast, TypeNode};
//! use viewcore::value::Value;
//!
//! let out = cast(&[TypeNode::Str, TypeNode::Int], &Value::from("42"), &SerdeJsonParser, true).unwrap();
//! assert_eq!(out, Value::Int(42));
//! ```

mod build;
mod cast;
mod node;
mod validator;

pub use build::{build_type_codes, field_default, ClassRegistry, DescriptorError, NOT_REQUIRED, NO_DEFAULT};
pub use cast::{cast, CastError, CastErrorKind};
pub use node::{codes, ClassField, ClassTarget, DefaultValue, Factory, FieldDefault, PlainClass, TypeNode};
pub use validator::TypeValidator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::SerdeJsonParser;
    use crate::value::{Dict, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cast_on(types: &[TypeNode], value: Value) -> Result<Value, CastError> {
        cast(types, &value, &SerdeJsonParser, true)
    }

    fn user_class(fields: Vec<ClassField>) -> TypeNode {
        TypeNode::class(Arc::new(PlainClass::new("User")), fields)
    }

    #[test]
    fn test_any_accepts_everything_in_any_position() {
        let unions = [
            vec![TypeNode::Any],
            vec![TypeNode::Int, TypeNode::Any],
            vec![TypeNode::Any, TypeNode::Bool, TypeNode::Str],
        ];
        let inputs = [
            Value::Null,
            Value::from("42"),
            Value::Int(3),
            Value::List(vec![Value::Bool(true)]),
        ];
        for union in &unions {
            for input in &inputs {
                assert_eq!(&cast_on(union, input.clone()).unwrap(), input);
                assert_eq!(&cast(union, input, &SerdeJsonParser, false).unwrap(), input);
            }
        }
    }

    #[test]
    fn test_integer_from_string() {
        assert_eq!(cast_on(&[TypeNode::Int], Value::from("42")).unwrap(), Value::Int(42));
        assert!(cast_on(&[TypeNode::Int], Value::from("forty")).is_err());
    }

    #[test]
    fn test_string_only_without_casting_rejects_int() {
        let err = cast(&[TypeNode::Str], &Value::Int(42), &SerdeJsonParser, false).unwrap_err();
        assert!(matches!(err.kind(), CastErrorKind::NotExact { expected: "string", .. }));
    }

    #[test]
    fn test_string_is_fallback_when_casting() {
        let union = [TypeNode::Str, TypeNode::Int];
        assert_eq!(cast_on(&union, Value::from("7")).unwrap(), Value::Int(7));
        assert_eq!(cast_on(&union, Value::from("seven")).unwrap(), Value::from("seven"));
    }

    #[test]
    fn test_none_is_fallback_when_casting() {
        let union = [TypeNode::None, TypeNode::Int];
        assert_eq!(cast_on(&union, Value::Null).unwrap(), Value::Null);
        assert_eq!(cast_on(&union, Value::from("1")).unwrap(), Value::Int(1));
        assert!(cast_on(&union, Value::from("x")).is_err());
    }

    #[test]
    fn test_bool_like_values() {
        let union = [TypeNode::Bool];
        assert_eq!(cast_on(&union, Value::from("true")).unwrap(), Value::Bool(true));
        assert_eq!(cast_on(&union, Value::Int(0)).unwrap(), Value::Bool(false));
        let err = cast_on(&union, Value::from("yes")).unwrap_err();
        assert_eq!(err.to_string(), "Not bool-like: \"yes\"");
    }

    #[test]
    fn test_float_from_string() {
        assert_eq!(cast_on(&[TypeNode::Float], Value::from("2.5")).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn test_float_rejects_int() {
        assert!(cast_on(&[TypeNode::Float], Value::Int(5)).is_err());
        assert_eq!(
            cast_on(&[TypeNode::Float, TypeNode::Int], Value::Int(5)).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_dict_from_json_casts_every_value() {
        let union = [TypeNode::Dict(vec![TypeNode::Int])];
        let out = cast_on(&union, Value::from(r#"{"a": "1", "b": 2}"#)).unwrap();
        assert_eq!(out.get("a"), Some(&Value::Int(1)));
        assert_eq!(out.get("b"), Some(&Value::Int(2)));

        let err = cast_on(&union, Value::from(r#"{"a": "x"}"#)).unwrap_err();
        assert_eq!(err.path(), "a");
    }

    #[test]
    fn test_list_requires_array() {
        let union = [TypeNode::List(vec![TypeNode::Int])];
        assert_eq!(
            cast_on(&union, Value::from("[1, \"2\"]")).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        let err = cast_on(&union, Value::from(r#"{"a": 1}"#)).unwrap_err();
        assert!(matches!(err.kind(), CastErrorKind::ExpectedArray(_)));
        let err = cast_on(&union, Value::from("[1, \"x\"]")).unwrap_err();
        assert_eq!(err.path(), "[1]");
    }

    #[test]
    fn test_class_defaulting() {
        let union = [user_class(vec![
            ClassField::required("name", vec![TypeNode::Str]),
            ClassField::new(
                "age",
                vec![TypeNode::Int],
                FieldDefault::Default(DefaultValue::Value(Value::Int(0))),
            ),
        ])];

        let out = cast_on(&union, Value::from(r#"{"name": "Al"}"#)).unwrap();
        let obj = out.as_object().unwrap();
        assert_eq!(obj.class(), "User");
        assert_eq!(obj.field("name"), Some(&Value::from("Al")));
        assert_eq!(obj.field("age"), Some(&Value::Int(0)));

        let err = cast_on(&union, Value::Dict(Dict::new())).unwrap_err();
        assert_eq!(err.kind(), &CastErrorKind::MissingKey("name".into()));
        assert_eq!(err.to_string(), "Missing key: name");
    }

    #[test]
    fn test_class_not_required_and_factory_defaults() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: Factory = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::List(Vec::new())
        });
        let union = [user_class(vec![
            ClassField::new("nick", vec![TypeNode::Str], FieldDefault::NotRequired),
            ClassField::new(
                "tags",
                vec![TypeNode::List(vec![TypeNode::Str])],
                FieldDefault::Default(DefaultValue::Factory(factory)),
            ),
        ])];

        let out = cast_on(&union, Value::Dict(Dict::new())).unwrap();
        let obj = out.as_object().unwrap();
        assert!(obj.field("nick").is_none());
        assert_eq!(obj.field("tags"), Some(&Value::List(Vec::new())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_class_prefers_alternate_constructor() {
        struct Point;
        impl ClassTarget for Point {
            fn name(&self) -> &str {
                "Point"
            }
            fn construct(&self, kwargs: &Dict) -> Option<Result<Value, String>> {
                let x = kwargs.get("x").and_then(Value::as_int).unwrap_or_default();
                Some(Ok(Value::Int(x * 10)))
            }
        }

        let union = [TypeNode::class(
            Arc::new(Point),
            vec![ClassField::required("x", vec![TypeNode::Int])],
        )];
        assert_eq!(cast_on(&union, Value::from(r#"{"x": "4"}"#)).unwrap(), Value::Int(40));
    }

    #[test]
    fn test_class_accepts_existing_instance() {
        let union = [user_class(vec![ClassField::required("name", vec![TypeNode::Str])])];
        let existing = Value::Object(crate::value::Object::new("User", Dict::new()));
        assert_eq!(cast(&union, &existing, &SerdeJsonParser, false).unwrap(), existing);
    }

    #[test]
    fn test_nested_field_error_path() {
        let inner = user_class(vec![ClassField::required("age", vec![TypeNode::Int])]);
        let union = [TypeNode::Dict(vec![inner])];
        let err = cast_on(&union, Value::from(r#"{"bob": {"age": "old"}}"#)).unwrap_err();
        assert_eq!(err.path(), "bob.age");
    }
}
