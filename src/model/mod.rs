//! Object model shared by the walker and every host implementation

mod validity;

pub use validity::is_unset;

use serde::Serialize;
use std::fmt;

/// Stable per-instance handle of a host-managed object.
///
/// Identity is the handle, never structural equality: two resources with the
/// same fields are still two objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a script type, e.g. `res://scripts/player.gd` or a class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TypeIdentity(String);

impl TypeIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The two capabilities the walker dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Scene-tree node: has named fields and structural children.
    Node,
    /// Resource: has named fields, may be nested inside other objects.
    Resource,
}

/// A field value as read from a host object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Literal the host does not model further (`Vector2(1, 2)`, dictionaries, ...)
    Opaque(String),
    Object(ObjectId),
    /// Tagged optional; `None` carries no type tag.
    Variant(Option<Box<Value>>),
    Array(Vec<Value>),
}

impl Value {
    /// Strip any number of tagged-value wrappers.
    pub fn unwrapped(&self) -> &Value {
        match self {
            Value::Variant(Some(inner)) => inner.unwrapped(),
            other => other,
        }
    }

    /// The elements of a collection value, looking through tagged wrappers.
    pub fn elements(&self) -> Option<&[Value]> {
        match self.unwrapped() {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The referenced object, looking through tagged wrappers.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self.unwrapped() {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn tagged(value: Value) -> Self {
        Value::Variant(Some(Box::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrapped_strips_nested_tags() {
        let value = Value::tagged(Value::tagged(Value::Int(3)));
        assert_eq!(value.unwrapped(), &Value::Int(3));

        let empty = Value::Variant(None);
        assert_eq!(empty.unwrapped(), &Value::Variant(None));
    }

    #[test]
    fn test_elements_and_object_look_through_tags() {
        let id = ObjectId::new(7);
        let array = Value::tagged(Value::Array(vec![Value::Object(id), Value::Nil]));
        assert_eq!(array.elements().map(<[Value]>::len), Some(2));
        assert_eq!(Value::tagged(Value::Object(id)).as_object(), Some(id));
        assert_eq!(Value::Str("x".into()).elements(), None);
    }
}
