//! Binary wire codec for documents.
//!
//! Layout:
//! ```text
//! [total_length: i32 LE]      // includes these 4 bytes and the terminator
//! [elements: tagged k/v]      // [tag: u8][key: cstring][value]
//! [terminator: 0x00]          // 1 byte
//! ```
//!
//! Value encodings by tag:
//! - 0x01 double: f64 LE
//! - 0x02 string: [i32 LE length incl. NUL][UTF-8 bytes][0x00]
//! - 0x03 document: embedded document, same layout
//! - 0x04 array: embedded document with "0", "1", ... keys
//! - 0x07 object id: 12 bytes
//! - 0x08 bool: 1 byte (0 or 1)
//! - 0x0A null: no payload
//! - 0x10 int32: i32 LE
//! - 0x12 int64: i64 LE
//!
//! Decoding is strict: declared length must match the slice, the
//! terminator must be present, and every element is bounds- and
//! UTF-8-checked before it is accepted.

use crate::document::{Document, ObjectId, Value, MAX_DOCUMENT_SIZE};
use crate::error::{OdmError, Result};

const TAG_DOUBLE: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_DOCUMENT: u8 = 0x03;
const TAG_ARRAY: u8 = 0x04;
const TAG_OBJECT_ID: u8 = 0x07;
const TAG_BOOL: u8 = 0x08;
const TAG_NULL: u8 = 0x0A;
const TAG_INT32: u8 = 0x10;
const TAG_INT64: u8 = 0x12;

/// Embedded documents and arrays may nest at most this deep.
const MAX_NESTING_DEPTH: usize = 64;

impl Document {
    /// Serialize to the length-prefixed binary layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 4];
        for (key, value) in self.iter() {
            write_element(&mut buf, key, value)?;
        }
        buf.push(0);

        let total = buf.len();
        if total > MAX_DOCUMENT_SIZE as usize {
            return Err(OdmError::OversizedDocument {
                declared: total as u32,
                max: MAX_DOCUMENT_SIZE,
            });
        }
        buf[0..4].copy_from_slice(&(total as i32).to_le_bytes());
        Ok(buf)
    }

    /// Parse a complete binary document. The slice must hold exactly one
    /// document: declared length equal to the slice length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        parse_document(bytes, 0)
    }
}

fn write_element(buf: &mut Vec<u8>, key: &str, value: &Value) -> Result<()> {
    if key.as_bytes().contains(&0) {
        return Err(OdmError::InvalidFormat(format!(
            "document key {:?} contains a NUL byte",
            key
        )));
    }

    let tag = match value {
        Value::Double(_) => TAG_DOUBLE,
        Value::String(_) => TAG_STRING,
        Value::Document(_) => TAG_DOCUMENT,
        Value::Array(_) => TAG_ARRAY,
        Value::ObjectId(_) => TAG_OBJECT_ID,
        Value::Bool(_) => TAG_BOOL,
        Value::Null => TAG_NULL,
        Value::Int32(_) => TAG_INT32,
        Value::Int64(_) => TAG_INT64,
    };
    buf.push(tag);
    buf.extend_from_slice(key.as_bytes());
    buf.push(0);

    match value {
        Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) => {
            // length includes the NUL terminator
            buf.extend_from_slice(&((s.len() + 1) as i32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
            buf.push(0);
        }
        Value::Document(doc) => buf.extend_from_slice(&doc.to_bytes()?),
        Value::Array(items) => {
            let as_doc: Document = items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect();
            buf.extend_from_slice(&as_doc.to_bytes()?);
        }
        Value::ObjectId(id) => buf.extend_from_slice(id.bytes()),
        Value::Bool(v) => buf.push(u8::from(*v)),
        Value::Null => {}
        Value::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
    }
    Ok(())
}

fn parse_document(bytes: &[u8], depth: usize) -> Result<Document> {
    if depth > MAX_NESTING_DEPTH {
        return Err(OdmError::InvalidFormat(
            "document nesting exceeds maximum depth".into(),
        ));
    }
    if bytes.len() < 5 {
        return Err(OdmError::InvalidFormat(format!(
            "document too small: {} bytes",
            bytes.len()
        )));
    }

    let mut reader = Reader::new(bytes);
    let declared = reader.read_i32()?;
    if declared < 0 || declared as usize != bytes.len() {
        return Err(OdmError::InvalidFormat(format!(
            "declared length {} does not match {} available bytes",
            declared,
            bytes.len()
        )));
    }
    if bytes[bytes.len() - 1] != 0 {
        return Err(OdmError::InvalidFormat(
            "document missing terminating byte".into(),
        ));
    }

    let body_end = bytes.len() - 1;
    let mut doc = Document::new();
    while reader.pos < body_end {
        let tag = reader.read_u8()?;
        let key = reader.read_cstring(body_end)?;
        let value = parse_value(tag, &mut reader, body_end, depth)?;
        if reader.pos > body_end {
            return Err(OdmError::InvalidFormat(format!(
                "element '{}' overruns document body",
                key
            )));
        }
        doc.insert(key, value);
    }
    Ok(doc)
}

fn parse_value(tag: u8, reader: &mut Reader<'_>, body_end: usize, depth: usize) -> Result<Value> {
    match tag {
        TAG_DOUBLE => Ok(Value::Double(f64::from_le_bytes(
            reader.read_fixed::<8>()?,
        ))),
        TAG_STRING => {
            let len = reader.read_i32()?;
            if len < 1 {
                return Err(OdmError::InvalidFormat(format!(
                    "string length {} must be at least 1",
                    len
                )));
            }
            let raw = reader.take(len as usize)?;
            let (content, terminator) = raw.split_at(raw.len() - 1);
            if terminator != [0] {
                return Err(OdmError::InvalidFormat(
                    "string missing NUL terminator".into(),
                ));
            }
            let s = std::str::from_utf8(content).map_err(|_| {
                OdmError::InvalidFormat("string contains invalid UTF-8".into())
            })?;
            Ok(Value::String(s.to_string()))
        }
        TAG_DOCUMENT | TAG_ARRAY => {
            let embedded = reader.peek_embedded(body_end)?;
            let doc = parse_document(embedded, depth + 1)?;
            reader.pos += embedded.len();
            if tag == TAG_DOCUMENT {
                Ok(Value::Document(doc))
            } else {
                Ok(Value::Array(doc.into_iter().map(|(_, v)| v).collect()))
            }
        }
        TAG_OBJECT_ID => Ok(Value::ObjectId(ObjectId::from_bytes(
            reader.read_fixed::<12>()?,
        ))),
        TAG_BOOL => match reader.read_u8()? {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            other => Err(OdmError::InvalidFormat(format!(
                "bool element has invalid payload {}",
                other
            ))),
        },
        TAG_NULL => Ok(Value::Null),
        TAG_INT32 => Ok(Value::Int32(i32::from_le_bytes(reader.read_fixed::<4>()?))),
        TAG_INT64 => Ok(Value::Int64(i64::from_le_bytes(reader.read_fixed::<8>()?))),
        other => Err(OdmError::InvalidFormat(format!(
            "unknown element tag 0x{:02x}",
            other
        ))),
    }
}

/// Bounds-checked forward reader over a byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(OdmError::InvalidFormat(format!(
                "element truncated at offset {}",
                self.pos
            ))),
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_fixed::<4>()?))
    }

    /// Read a NUL-terminated UTF-8 key. The NUL must appear before
    /// `limit` (the document terminator position).
    fn read_cstring(&mut self, limit: usize) -> Result<String> {
        let search = &self.bytes[self.pos..limit];
        let nul = search.iter().position(|&b| b == 0).ok_or_else(|| {
            OdmError::InvalidFormat("element key missing NUL terminator".into())
        })?;
        let key = std::str::from_utf8(&search[..nul])
            .map_err(|_| OdmError::InvalidFormat("element key contains invalid UTF-8".into()))?
            .to_string();
        self.pos += nul + 1;
        Ok(key)
    }

    /// Borrow an embedded document's full byte range (validates its own
    /// length prefix against the enclosing bounds) without consuming it.
    fn peek_embedded(&self, limit: usize) -> Result<&'a [u8]> {
        if self.pos + 4 > limit {
            return Err(OdmError::InvalidFormat(
                "embedded document header truncated".into(),
            ));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        let len = i32::from_le_bytes(len_bytes);
        if len < 5 {
            return Err(OdmError::InvalidFormat(format!(
                "embedded document declares invalid length {}",
                len
            )));
        }
        let end = self.pos.checked_add(len as usize).filter(|&e| e <= limit);
        match end {
            Some(end) => Ok(&self.bytes[self.pos..end]),
            None => Err(OdmError::InvalidFormat(
                "embedded document overruns enclosing document".into(),
            )),
        }
    }
}
