use super::node::{codes, ClassField, ClassTarget, DefaultValue, FieldDefault, TypeNode};
use crate::value::Value;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default-slot sentinel: the field has no default and is required.
pub const NO_DEFAULT: &str = "__VIEW_NODEFAULT__";
/// Default-slot sentinel: the field may be absent.
pub const NOT_REQUIRED: &str = "__VIEW_NOREQ__";

/// Errors raised while turning a host descriptor into a [`TypeNode`] tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The descriptor list (or a child list) is not an array.
    ExpectedList,
    /// An entry is not a `[code, object, children, default?]` array.
    MalformedEntry(String),
    UnknownCode(i64),
    UnknownClass(String),
    /// A class field entry appeared outside of a class.
    FieldOutsideClass,
    /// A class child was not a class field entry.
    ExpectedField(i64),
    /// A class or class-field entry had no name in the object slot.
    ExpectedName,
    /// A loader mapping lacked a required key.
    MissingKey(&'static str),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::ExpectedList => f.write_str("expected a sequence of type codes"),
            DescriptorError::MalformedEntry(e) => write!(f, "malformed type code entry: {e}"),
            DescriptorError::UnknownCode(c) => write!(f, "invalid typecode: {c}"),
            DescriptorError::UnknownClass(c) => write!(f, "unknown class in type codes: {c}"),
            DescriptorError::FieldOutsideClass => {
                f.write_str("class field type code used outside of a class")
            }
            DescriptorError::ExpectedField(c) => {
                write!(f, "expected class field type code, got {c}")
            }
            DescriptorError::ExpectedName => f.write_str("expected a name in type code entry"),
            DescriptorError::MissingKey(k) => write!(f, "missing key in loader dict: {k}"),
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Classes a descriptor may refer to by name.
#[derive(Default, Clone)]
pub struct ClassRegistry {
    classes: HashMap<String, Arc<dyn ClassTarget>>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: Arc<dyn ClassTarget>) {
        self.classes.insert(target.name().to_owned(), target);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ClassTarget>> {
        self.classes.get(name).cloned()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.classes.keys()).finish()
    }
}

/// Build a union from a descriptor list.
///
/// Each entry is `[code, object, children]` or `[code, object, children, default]`.
/// The object slot holds the class name for `CLASS` entries and the field
/// name for `CLASS_FIELD` entries. The default slot only matters for class
/// fields: absent or [`NO_DEFAULT`] means required, [`NOT_REQUIRED`] means
/// optional, anything else is a concrete default.
pub fn build_type_codes(
    descriptors: &Json,
    classes: &ClassRegistry,
) -> Result<Vec<TypeNode>, DescriptorError> {
    let entries = descriptors.as_array().ok_or(DescriptorError::ExpectedList)?;
    entries
        .iter()
        .map(|entry| build_node(entry, classes))
        .collect()
}

struct Entry<'a> {
    code: i64,
    object: &'a Json,
    children: &'a Json,
    default: Option<&'a Json>,
}

fn split_entry(entry: &Json) -> Result<Entry<'_>, DescriptorError> {
    let parts = entry
        .as_array()
        .filter(|p| p.len() == 3 || p.len() == 4)
        .ok_or_else(|| DescriptorError::MalformedEntry(entry.to_string()))?;
    let code = parts[0]
        .as_i64()
        .ok_or_else(|| DescriptorError::MalformedEntry(entry.to_string()))?;
    Ok(Entry {
        code,
        object: &parts[1],
        children: &parts[2],
        default: parts.get(3),
    })
}

fn build_node(entry: &Json, classes: &ClassRegistry) -> Result<TypeNode, DescriptorError> {
    let entry = split_entry(entry)?;
    let node = match entry.code {
        codes::ANY => TypeNode::Any,
        codes::STR => TypeNode::Str,
        codes::INT => TypeNode::Int,
        codes::BOOL => TypeNode::Bool,
        codes::FLOAT => TypeNode::Float,
        codes::NONE => TypeNode::None,
        codes::DICT => TypeNode::Dict(build_type_codes(entry.children, classes)?),
        codes::LIST => TypeNode::List(build_type_codes(entry.children, classes)?),
        codes::CLASS => {
            let name = entry.object.as_str().ok_or(DescriptorError::ExpectedName)?;
            let target = classes
                .get(name)
                .ok_or_else(|| DescriptorError::UnknownClass(name.to_owned()))?;
            let fields = entry
                .children
                .as_array()
                .ok_or(DescriptorError::ExpectedList)?
                .iter()
                .map(|child| build_field(child, classes))
                .collect::<Result<Vec<_>, _>>()?;
            TypeNode::Class { target, fields }
        }
        codes::CLASS_FIELD => return Err(DescriptorError::FieldOutsideClass),
        other => return Err(DescriptorError::UnknownCode(other)),
    };
    Ok(node)
}

fn build_field(entry: &Json, classes: &ClassRegistry) -> Result<ClassField, DescriptorError> {
    let entry = split_entry(entry)?;
    if entry.code != codes::CLASS_FIELD {
        return Err(DescriptorError::ExpectedField(entry.code));
    }
    let name = entry.object.as_str().ok_or(DescriptorError::ExpectedName)?;
    Ok(ClassField {
        name: name.to_owned(),
        types: build_type_codes(entry.children, classes)?,
        default: field_default(entry.default),
    })
}

/// Interpret the default slot of a descriptor entry.
#[must_use]
pub fn field_default(slot: Option<&Json>) -> FieldDefault {
    match slot {
        None => FieldDefault::Required,
        Some(Json::String(s)) if s == NO_DEFAULT => FieldDefault::Required,
        Some(Json::String(s)) if s == NOT_REQUIRED => FieldDefault::NotRequired,
        Some(value) => FieldDefault::Default(DefaultValue::Value(Value::from(value.clone()))),
    }
}
