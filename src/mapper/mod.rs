//! Record ↔ document mapping
//!
//! A record type declares its fields once, in declaration order, through
//! the [`Record`] visitation contract; the mapper is generic over that
//! contract, never over concrete types. Writes are exhaustive (every
//! declared field must serialize), reads are tolerant (keys missing from
//! the document leave the field at its current value) — the usual
//! asymmetry for schema-less stores, where old documents outlive the
//! schema that wrote them.
//!
//! For plain structs, [`impl_record!`] derives the whole contract from
//! the field list:
//!
//! ```
//! use docbind::{impl_record, mapper};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Foo {
//!     a: i32,
//!     b: i32,
//!     c: i32,
//! }
//! impl_record!(Foo { a, b, c });
//!
//! let doc = mapper::to_document(&Foo { a: 1, b: 4, c: 9 }).unwrap();
//! let back: Foo = mapper::to_record(&doc).unwrap();
//! assert_eq!(back, Foo { a: 1, b: 4, c: 9 });
//! ```

use crate::document::{Document, ObjectId, Value};
use crate::error::{OdmError, Result};

/// Ordered field enumeration for a record type.
///
/// Both methods must visit the same fields, under the same names, in the
/// same order, on every call. `visit_fields` drives serialization,
/// `visit_fields_mut` drives population from a document.
pub trait Record {
    fn visit_fields<V: FieldVisitor>(&self, visitor: &mut V) -> Result<()>;
    fn visit_fields_mut<V: FieldVisitorMut>(&mut self, visitor: &mut V) -> Result<()>;
}

/// Read-side visitor: receives each field by name.
pub trait FieldVisitor {
    fn field(&mut self, name: &'static str, value: &dyn FieldValue) -> Result<()>;
}

/// Write-side visitor: receives each field by name, mutably.
pub trait FieldVisitorMut {
    fn field(&mut self, name: &'static str, value: &mut dyn FieldValue) -> Result<()>;
}

/// Conversion failure for a single field, before the field name is
/// attached by the mapper.
#[derive(Debug, Clone, Copy)]
pub struct FieldTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

/// One field's conversion to and from a document element.
pub trait FieldValue {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError>;
    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError>;
}

// -- Provided field conversions -----------------------------------------------

impl FieldValue for i32 {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::Int32(*self))
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::Int32(v) => {
                *self = *v;
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "int32",
                found: other.kind(),
            }),
        }
    }
}

impl FieldValue for i64 {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::Int64(*self))
    }

    // int32 widens losslessly
    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::Int64(v) => {
                *self = *v;
                Ok(())
            }
            Value::Int32(v) => {
                *self = i64::from(*v);
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "int64",
                found: other.kind(),
            }),
        }
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::Double(*self))
    }

    // any numeric representation widens to double
    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value.as_number() {
            Some(v) => {
                *self = v;
                Ok(())
            }
            None => Err(FieldTypeError {
                expected: "double",
                found: value.kind(),
            }),
        }
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::Bool(*self))
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::Bool(v) => {
                *self = *v;
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }
}

impl FieldValue for String {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::String(self.clone()))
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::String(s) => {
                *self = s.clone();
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "string",
                found: other.kind(),
            }),
        }
    }
}

impl FieldValue for Document {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::Document(self.clone()))
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::Document(doc) => {
                *self = doc.clone();
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "document",
                found: other.kind(),
            }),
        }
    }
}

impl FieldValue for ObjectId {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        Ok(Value::ObjectId(*self))
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::ObjectId(id) => {
                *self = *id;
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "objectId",
                found: other.kind(),
            }),
        }
    }
}

/// `None` serializes as null; null or a convertible value deserializes.
impl<T: FieldValue + Default> FieldValue for Option<T> {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        if matches!(value, Value::Null) {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.set_from(value)?;
        *self = Some(inner);
        Ok(())
    }
}

impl<T: FieldValue + Default> FieldValue for Vec<T> {
    fn to_value(&self) -> std::result::Result<Value, FieldTypeError> {
        let items = self
            .iter()
            .map(FieldValue::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
    }

    fn set_from(&mut self, value: &Value) -> std::result::Result<(), FieldTypeError> {
        match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let mut slot = T::default();
                    slot.set_from(item)?;
                    out.push(slot);
                }
                *self = out;
                Ok(())
            }
            other => Err(FieldTypeError {
                expected: "array",
                found: other.kind(),
            }),
        }
    }
}

// -- Mapping operations -------------------------------------------------------

struct DocumentWriter {
    doc: Document,
}

impl FieldVisitor for DocumentWriter {
    fn field(&mut self, name: &'static str, value: &dyn FieldValue) -> Result<()> {
        let converted = value.to_value().map_err(|e| OdmError::UnsupportedField {
            field: name.to_string(),
            reason: format!("{} value cannot be written as {}", e.found, e.expected),
        })?;
        self.doc.insert(name, converted);
        Ok(())
    }
}

struct DocumentReader<'a> {
    doc: &'a Document,
}

impl FieldVisitorMut for DocumentReader<'_> {
    fn field(&mut self, name: &'static str, value: &mut dyn FieldValue) -> Result<()> {
        match self.doc.get(name) {
            // Missing keys are legal on read; the field keeps its value.
            None => Ok(()),
            Some(element) => value.set_from(element).map_err(|e| OdmError::TypeMismatch {
                field: name.to_string(),
                expected: e.expected,
                found: e.found,
            }),
        }
    }
}

/// Serialize every declared field of `record`, in declaration order.
/// Fails whole if any field cannot be represented.
pub fn to_document<T: Record>(record: &T) -> Result<Document> {
    let mut writer = DocumentWriter {
        doc: Document::new(),
    };
    record.visit_fields(&mut writer)?;
    Ok(writer.doc)
}

/// Populate `record` in place from `doc`. Keys absent from the document
/// leave their field untouched; present keys that cannot convert fail
/// with `TypeMismatch`.
pub fn to_record_into<T: Record>(doc: &Document, record: &mut T) -> Result<()> {
    let mut reader = DocumentReader { doc };
    record.visit_fields_mut(&mut reader)
}

/// Construct a `T` from `doc`, starting from `T::default()`.
pub fn to_record<T: Record + Default>(doc: &Document) -> Result<T> {
    let mut record = T::default();
    to_record_into(doc, &mut record)?;
    Ok(record)
}

/// Absent document maps to absent record.
pub fn to_optional_record<T: Record + Default>(doc: Option<Document>) -> Result<Option<T>> {
    match doc {
        Some(doc) => Ok(Some(to_record(&doc)?)),
        None => Ok(None),
    }
}

/// Implement [`Record`] (and equality-filter conversion) for a struct
/// from its field list:
///
/// ```ignore
/// impl_record!(Foo { a, b, c });
/// ```
///
/// Field order in the macro call is the document key order.
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::mapper::Record for $ty {
            fn visit_fields<V: $crate::mapper::FieldVisitor>(
                &self,
                visitor: &mut V,
            ) -> $crate::error::Result<()> {
                $( visitor.field(stringify!($field), &self.$field)?; )+
                Ok(())
            }

            fn visit_fields_mut<V: $crate::mapper::FieldVisitorMut>(
                &mut self,
                visitor: &mut V,
            ) -> $crate::error::Result<()> {
                $( visitor.field(stringify!($field), &mut self.$field)?; )+
                Ok(())
            }
        }

        impl $crate::collection::IntoFilter for &$ty {
            fn into_filter(self) -> $crate::error::Result<$crate::document::Document> {
                $crate::mapper::to_document(self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Foo {
        a: i32,
        b: i32,
        c: i32,
    }
    impl_record!(Foo { a, b, c });

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Mixed {
        id: Option<ObjectId>,
        name: String,
        score: f64,
        big: i64,
        active: bool,
        tags: Vec<String>,
        extra: Document,
    }
    impl_record!(Mixed { id, name, score, big, active, tags, extra });

    #[test]
    fn test_to_document_key_order_matches_declaration() {
        let doc = to_document(&Foo { a: 1, b: 4, c: 9 }).unwrap();
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(doc.get("a"), Some(&Value::Int32(1)));
        assert_eq!(doc.get("b"), Some(&Value::Int32(4)));
        assert_eq!(doc.get("c"), Some(&Value::Int32(9)));
    }

    #[test]
    fn test_round_trip() {
        let original = Mixed {
            id: Some(ObjectId::new()),
            name: "widget".into(),
            score: 2.5,
            big: 1 << 40,
            active: true,
            tags: vec!["x".into(), "y".into()],
            extra: doc! { "nested" => 1 },
        };
        let doc = to_document(&original).unwrap();
        let back: Mixed = to_record(&doc).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_partial_document_leaves_defaults() {
        let doc = doc! { "b" => 42 };
        let foo: Foo = to_record(&doc).unwrap();
        assert_eq!(foo, Foo { a: 0, b: 42, c: 0 });
    }

    #[test]
    fn test_to_record_into_preserves_unmatched_fields() {
        let mut foo = Foo { a: 7, b: 7, c: 7 };
        to_record_into(&doc! { "c" => 9 }, &mut foo).unwrap();
        assert_eq!(foo, Foo { a: 7, b: 7, c: 9 });
    }

    #[test]
    fn test_type_mismatch_names_field() {
        let doc = doc! { "a" => "not an int" };
        let err = to_record::<Foo>(&doc).unwrap_err();
        match err {
            OdmError::TypeMismatch {
                field,
                expected,
                found,
            } => {
                assert_eq!(field, "a");
                assert_eq!(expected, "int32");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_option_null_and_missing() {
        let with_null = doc! { "id" => Value::Null, "name" => "n" };
        let mixed: Mixed = to_record(&with_null).unwrap();
        assert_eq!(mixed.id, None);
        assert_eq!(mixed.name, "n");

        // None serializes as an explicit null element.
        let doc = to_document(&Mixed::default()).unwrap();
        assert_eq!(doc.get("id"), Some(&Value::Null));
    }

    #[test]
    fn test_numeric_widening_on_read() {
        let doc = doc! { "score" => 3, "big" => 12 };
        let mixed: Mixed = to_record(&doc).unwrap();
        assert_eq!(mixed.score, 3.0);
        assert_eq!(mixed.big, 12);
    }

    #[test]
    fn test_vec_element_mismatch_fails() {
        let doc = doc! { "tags" => vec![Value::String("ok".into()), Value::Int32(3)] };
        let err = to_record::<Mixed>(&doc).unwrap_err();
        assert!(
            matches!(err, OdmError::TypeMismatch { ref field, .. } if field == "tags"),
            "{err}"
        );
    }

    #[test]
    fn test_to_optional_record() {
        assert_eq!(to_optional_record::<Foo>(None).unwrap(), None);

        let doc = to_document(&Foo { a: 1, b: 4, c: 9 }).unwrap();
        let restored = to_optional_record::<Foo>(Some(doc)).unwrap();
        assert_eq!(restored, Some(Foo { a: 1, b: 4, c: 9 }));
    }

    #[test]
    fn test_mapped_document_survives_wire_codec() {
        let original = Foo { a: 1, b: 4, c: 9 };
        let bytes = to_document(&original).unwrap().to_bytes().unwrap();
        let parsed = Document::from_bytes(&bytes).unwrap();
        assert_eq!(to_record::<Foo>(&parsed).unwrap(), original);
    }
}
