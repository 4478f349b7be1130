use crate::value::{Dict, Object, Value};
use std::fmt;
use std::sync::Arc;

/// Numeric tags used by host-supplied descriptors.
pub mod codes {
    pub const ANY: i64 = 0;
    pub const STR: i64 = 1;
    pub const INT: i64 = 2;
    pub const BOOL: i64 = 3;
    pub const FLOAT: i64 = 4;
    pub const DICT: i64 = 5;
    pub const NONE: i64 = 6;
    pub const CLASS: i64 = 7;
    pub const CLASS_FIELD: i64 = 8;
    pub const LIST: i64 = 9;
}

/// Zero-argument default factory.
pub type Factory = Arc<dyn Fn() -> Value + Send + Sync>;

/// A concrete default: either a value or a factory called on each use.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Factory(Factory),
}

impl DefaultValue {
    /// Produce the default, calling the factory when there is one.
    #[must_use]
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// What happens when a class field is absent from the input mapping.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// Absence is a missing-key error.
    Required,
    /// Absence is tolerated and the field is left out of the constructor arguments.
    NotRequired,
    /// Absence falls back to this default.
    Default(DefaultValue),
}

/// Target type of a `Class` node.
///
/// `construct` is the alternate construction entry point. When it returns
/// `Some`, its result is used; otherwise the class is built with
/// [`ClassTarget::instantiate`].
pub trait ClassTarget: Send + Sync {
    fn name(&self) -> &str;

    fn construct(&self, _kwargs: &Dict) -> Option<Result<Value, String>> {
        None
    }

    fn instantiate(&self, kwargs: Dict) -> Result<Value, String> {
        Ok(Value::Object(Object::new(self.name(), kwargs)))
    }
}

/// A [`ClassTarget`] with no custom construction.
#[derive(Debug, Clone)]
pub struct PlainClass {
    name: Arc<str>,
}

impl PlainClass {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }
}

impl ClassTarget for PlainClass {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One declared field of a `Class` node.
#[derive(Debug, Clone)]
pub struct ClassField {
    pub name: String,
    pub types: Vec<TypeNode>,
    pub default: FieldDefault,
}

impl ClassField {
    pub fn new(name: impl Into<String>, types: Vec<TypeNode>, default: FieldDefault) -> Self {
        Self {
            name: name.into(),
            types,
            default,
        }
    }

    pub fn required(name: impl Into<String>, types: Vec<TypeNode>) -> Self {
        Self::new(name, types, FieldDefault::Required)
    }
}

/// Node of the recursive type tree. A `&[TypeNode]` is a union.
#[derive(Clone)]
pub enum TypeNode {
    Any,
    Str,
    Int,
    Bool,
    Float,
    None,
    /// Mapping whose values must all match the child union.
    Dict(Vec<TypeNode>),
    /// Sequence whose items must all match the child union.
    List(Vec<TypeNode>),
    Class {
        target: Arc<dyn ClassTarget>,
        fields: Vec<ClassField>,
    },
}

impl TypeNode {
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            TypeNode::Any => codes::ANY,
            TypeNode::Str => codes::STR,
            TypeNode::Int => codes::INT,
            TypeNode::Bool => codes::BOOL,
            TypeNode::Float => codes::FLOAT,
            TypeNode::None => codes::NONE,
            TypeNode::Dict(_) => codes::DICT,
            TypeNode::List(_) => codes::LIST,
            TypeNode::Class { .. } => codes::CLASS,
        }
    }

    pub fn class(target: Arc<dyn ClassTarget>, fields: Vec<ClassField>) -> Self {
        TypeNode::Class { target, fields }
    }
}

impl fmt::Debug for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Any => f.write_str("Any"),
            TypeNode::Str => f.write_str("Str"),
            TypeNode::Int => f.write_str("Int"),
            TypeNode::Bool => f.write_str("Bool"),
            TypeNode::Float => f.write_str("Float"),
            TypeNode::None => f.write_str("None"),
            TypeNode::Dict(children) => f.debug_tuple("Dict").field(children).finish(),
            TypeNode::List(children) => f.debug_tuple("List").field(children).finish(),
            TypeNode::Class { target, fields } => f
                .debug_struct("Class")
                .field("target", &target.name())
                .field("fields", fields)
                .finish(),
        }
    }
}
