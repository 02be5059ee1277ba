//! Schema-less binary documents
//!
//! A [`Document`] is an ordered sequence of keyed, typed elements. It is
//! the unit both pipelines exchange: the framer reconstructs documents
//! from raw bytes, the mapper builds them from typed records, and the
//! collection facade passes them to the store collaborator.

pub mod json;
pub mod oid;
pub mod raw;

pub use oid::ObjectId;

/// Hard ceiling on serialized document size (16 MiB). Documents declaring
/// a larger length are rejected before any buffer is allocated.
pub const MAX_DOCUMENT_SIZE: u32 = 16 * 1024 * 1024;

/// A single typed element value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    ObjectId(ObjectId),
    Bool(bool),
    Null,
    Int32(i32),
    Int64(i64),
}

impl Value {
    /// Human-readable type name, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Document(_) => "document",
            Value::Array(_) => "array",
            Value::ObjectId(_) => "objectId",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// Widen any numeric value to f64. Used for store-side comparisons
    /// where int32/int64/double compare across representations.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// Ordered key/value element sequence.
///
/// Keys behave map-like: [`Document::insert`] replaces an existing key in
/// place, preserving its position, so element order is always the order
/// of first insertion. Lookup is a linear scan, which matches the small
/// documents this crate handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    elements: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a keyed value, preserving first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.elements.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.elements.push((key, value));
        }
    }

    /// Builder-style insert for literal construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.elements
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.elements.iter().position(|(k, _)| k == key)?;
        Some(self.elements.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.elements.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

/// Literal document construction: `doc! { "a" => 1, "b" => "x" }`.
#[macro_export]
macro_rules! doc {
    () => { $crate::document::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::document::Document::new();
        $( d.insert($key, $value); )+
        d
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let doc = doc! { "c" => 9, "a" => 1, "b" => 4 };
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = doc! { "a" => 1, "b" => 4 };
        doc.insert("a", 7);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Value::Int32(7)));
    }

    #[test]
    fn test_get_and_remove() {
        let mut doc = doc! { "a" => 1, "b" => "x" };
        assert_eq!(doc.get("b").and_then(Value::as_str), Some("x"));
        assert!(doc.contains_key("a"));
        assert_eq!(doc.remove("a"), Some(Value::Int32(1)));
        assert!(!doc.contains_key("a"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_value_kinds_and_accessors() {
        assert_eq!(Value::Int32(1).kind(), "int32");
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::Int32(1).as_i32(), Some(1));
        assert_eq!(Value::Int32(1).as_i64(), None);
        assert_eq!(Value::Int64(2).as_number(), Some(2.0));
        assert_eq!(Value::Double(1.5).as_number(), Some(1.5));
        assert_eq!(Value::Bool(true).as_number(), None);
    }

    #[test]
    fn test_nested_document_value() {
        let doc = doc! { "inner" => doc! { "x" => 1 } };
        let inner = doc.get("inner").and_then(Value::as_document).unwrap();
        assert_eq!(inner.get("x"), Some(&Value::Int32(1)));
    }
}
