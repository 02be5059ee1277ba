//! Lazy cursors over query results
//!
//! [`RawCursor`] is the store-side stream of documents; a
//! [`DeserializingCursor`] wraps one and maps each document into a typed
//! record as it is pulled. Both are forward-only and single-pass.

use std::marker::PhantomData;

use crate::document::Document;
use crate::error::Result;
use crate::mapper::{to_record, Record};

/// Forward-only stream of raw documents from a collection operation.
pub struct RawCursor {
    docs: Box<dyn Iterator<Item = Result<Document>> + Send>,
}

impl RawCursor {
    pub fn new(iter: impl Iterator<Item = Result<Document>> + Send + 'static) -> Self {
        RawCursor {
            docs: Box::new(iter),
        }
    }

    /// Cursor over an already-materialized result set.
    pub fn from_documents(docs: Vec<Document>) -> Self {
        Self::new(docs.into_iter().map(Ok))
    }
}

impl Iterator for RawCursor {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.docs.next()
    }
}

/// Typed view over a [`RawCursor`]: each document is converted through
/// the mapper as it is pulled.
///
/// Single-pass and fused: after the underlying cursor is exhausted, or
/// after one item fails to map, every further `next()` returns `None`.
/// A mapping failure terminates the iteration (it is yielded once as
/// `Err`, then the cursor is done).
pub struct DeserializingCursor<T> {
    raw: RawCursor,
    done: bool,
    _records: PhantomData<fn() -> T>,
}

impl<T: Record + Default> DeserializingCursor<T> {
    pub fn new(raw: RawCursor) -> Self {
        DeserializingCursor {
            raw,
            done: false,
            _records: PhantomData,
        }
    }
}

impl<T: Record + Default> Iterator for DeserializingCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.raw.next() {
            None => {
                self.done = true;
                None
            }
            Some(Ok(doc)) => match to_record::<T>(&doc) {
                Ok(record) => Some(Ok(record)),
                Err(err) => {
                    self.done = true;
                    Some(Err(err))
                }
            },
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
