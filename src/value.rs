//! Runtime value container and the object heap (§3 "Runtime value" / "Heap").
//!
//! A [`Value`] is immutable-by-replacement: assigning a new value to a
//! binding replaces the slot wholesale rather than mutating through a
//! reference. The one exception is [`Value::Object`], which names a heap
//! entry rather than owning it — record mutation goes through [`Heap`].

use std::collections::HashMap;
use std::fmt;

pub type ObjectId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Char(char),
    String(String),
    Bool(bool),
    /// A weak reference into the [`Heap`]: names an entry but does not own it.
    Object(ObjectId),
    Nil,
}

impl Value {
    /// The textual form `print`/`itos`/`dtos`/string-concatenation use.
    pub fn display_string(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Char(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Bool(v) => v.to_string(),
            Value::Object(id) => format!("<object #{id}>"),
            Value::Nil => "nil".to_owned(),
        }
    }

    /// Unwraps a boolean value; the type checker guarantees conditions and
    /// `not`/`and`/`or` operands are `bool` before this is ever called.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => unreachable!("type checker guarantees a bool here, found {other:?}"),
        }
    }

    /// Unwraps an integer value; see [`Self::as_bool`].
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            other => unreachable!("type checker guarantees an int here, found {other:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

/// A single heap-allocated record instance: a map from field name to its
/// current value, in no particular order.
#[derive(Debug, Clone, Default)]
pub struct RecordObject {
    pub type_name: String,
    pub fields: HashMap<String, Value>,
}

/// Append-only object store keyed by monotonically-assigned [`ObjectId`].
/// Ids are never reused within one program run and records are never freed
/// (§1 Non-goals: no garbage collection).
#[derive(Debug, Default)]
pub struct Heap {
    objects: HashMap<ObjectId, RecordObject>,
    next_id: ObjectId,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: HashMap::new(),
            next_id: 0,
        }
    }

    /// Allocate a fresh record object and return its id.
    pub fn allocate(&mut self, type_name: impl Into<String>, fields: HashMap<String, Value>) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(
            id,
            RecordObject {
                type_name: type_name.into(),
                fields,
            },
        );
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&RecordObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut RecordObject> {
        self.objects.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_ids_are_monotonic_and_never_reused() {
        let mut heap = Heap::new();
        let a = heap.allocate("P", HashMap::new());
        let b = heap.allocate("P", HashMap::new());
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert!(heap.get(a).is_some());
        assert!(heap.get(b).is_some());
    }

    #[test]
    fn field_mutation_is_visible_through_every_alias() {
        let mut heap = Heap::new();
        let mut fields = HashMap::new();
        fields.insert("x".to_owned(), Value::Int(0));
        let id = heap.allocate("P", fields);

        heap.get_mut(id).unwrap().fields.insert("x".to_owned(), Value::Int(5));

        assert_eq!(heap.get(id).unwrap().fields.get("x"), Some(&Value::Int(5)));
    }
}
