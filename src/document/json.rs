//! JSON literal bridge
//!
//! Filters, updates, and pipelines are often easiest to state as JSON
//! text. [`Document::from_json`] converts a JSON object literal into a
//! document; integers become int32 when they fit, int64 otherwise.

use serde_json::Value as Json;

use crate::document::{Document, Value};
use crate::error::{OdmError, Result};

impl Document {
    /// Parse a JSON object literal into a document.
    pub fn from_json(text: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(text)?;
        match json {
            Json::Object(map) => {
                let mut doc = Document::new();
                for (key, value) in map {
                    doc.insert(key, json_to_value(value)?);
                }
                Ok(doc)
            }
            other => Err(OdmError::InvalidFormat(format!(
                "expected a JSON object literal, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Render as JSON for logs and diagnostics. Object ids become hex
    /// strings; non-finite doubles become null.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.iter()
                .map(|(k, v)| (k.to_string(), value_to_json(v)))
                .collect(),
        )
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn json_to_value(json: Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Value::Int32(small),
                    Err(_) => Value::Int64(i),
                }
            } else if let Some(f) = n.as_f64() {
                Value::Double(f)
            } else {
                return Err(OdmError::InvalidFormat(format!(
                    "JSON number {} out of representable range",
                    n
                )));
            }
        }
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(map) => {
            let mut doc = Document::new();
            for (k, v) in map {
                doc.insert(k, json_to_value(v)?);
            }
            Value::Document(doc)
        }
    })
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::Document(doc) => doc.to_json(),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::ObjectId(id) => Json::String(id.to_string()),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null => Json::Null,
        Value::Int32(v) => Json::Number((*v).into()),
        Value::Int64(v) => Json::Number((*v).into()),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
