//! Typed collection facade over a raw document store
//!
//! [`RawCollection`] is the boundary to the store collaborator: every
//! operation works on opaque [`Document`] values and store-native result
//! objects. [`TypedCollection`] composes that boundary with the mapper so
//! callers work in their own record types; "no match" is an absent
//! result, never an error, and store failures pass through unmasked.

pub mod cursor;
pub mod memory;

pub use cursor::{DeserializingCursor, RawCursor};
pub use memory::MemoryCollection;

use std::marker::PhantomData;

use crate::document::{Document, Value};
use crate::error::Result;
use crate::mapper::{to_document, to_optional_record, Record};

// -- Operation options --------------------------------------------------------

/// Options for `count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountOptions {
    /// Count at most this many matches.
    pub limit: Option<u64>,
    /// Skip this many matches before counting.
    pub skip: Option<u64>,
}

impl CountOptions {
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Which side of a replace/update a `find_one_and_*` call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    /// The document as it was before the mutation.
    #[default]
    Before,
    /// The document as it is after the mutation.
    After,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOneAndReplaceOptions {
    pub return_document: ReturnDocument,
}

impl FindOneAndReplaceOptions {
    pub fn return_document(mut self, which: ReturnDocument) -> Self {
        self.return_document = which;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOneAndUpdateOptions {
    pub return_document: ReturnDocument,
}

impl FindOneAndUpdateOptions {
    pub fn return_document(mut self, which: ReturnDocument) -> Self {
        self.return_document = which;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOptions {
    /// Insert the replacement when no document matches.
    pub upsert: bool,
}

impl ReplaceOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a document built from the filter and update when no
    /// document matches.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

// -- Operation results --------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// `_id` of the inserted document (generated when absent).
    pub inserted_id: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    pub inserted_count: u64,
    /// `_id`s in insertion order.
    pub inserted_ids: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// `_id` of an upserted document, when an upsert happened.
    pub upserted_id: Option<Value>,
}

// -- Store collaborator boundary ----------------------------------------------

/// Synchronous document-store collaborator.
///
/// Implementations own transport, durability, and query execution; this
/// crate only requires the operation surface below, all in terms of
/// opaque documents. Mirrors the shape of a store driver's collection
/// handle. Operations that matched no document return `Ok(None)` — an
/// absent result, never an error. Store-level failures surface as
/// `Err` and are not masked.
pub trait RawCollection: Send {
    fn count(&self, filter: &Document, options: &CountOptions) -> Result<u64>;

    fn find(&self, filter: &Document) -> Result<RawCursor>;

    fn find_one(&self, filter: &Document) -> Result<Option<Document>>;

    fn find_one_and_delete(&mut self, filter: &Document) -> Result<Option<Document>>;

    fn find_one_and_replace(
        &mut self,
        filter: &Document,
        replacement: Document,
        options: &FindOneAndReplaceOptions,
    ) -> Result<Option<Document>>;

    fn find_one_and_update(
        &mut self,
        filter: &Document,
        update: &Document,
        options: &FindOneAndUpdateOptions,
    ) -> Result<Option<Document>>;

    fn insert_one(&mut self, doc: Document) -> Result<Option<InsertOneResult>>;

    fn insert_many(&mut self, docs: Vec<Document>) -> Result<Option<InsertManyResult>>;

    fn delete_one(&mut self, filter: &Document) -> Result<Option<DeleteResult>>;

    fn delete_many(&mut self, filter: &Document) -> Result<Option<DeleteResult>>;

    fn replace_one(
        &mut self,
        filter: &Document,
        replacement: Document,
        options: &ReplaceOptions,
    ) -> Result<Option<UpdateResult>>;

    fn update_one(
        &mut self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<Option<UpdateResult>>;

    fn update_many(
        &mut self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<Option<UpdateResult>>;

    fn aggregate(&self, pipeline: &[Document]) -> Result<RawCursor>;
}

// -- Filters ------------------------------------------------------------------

/// Anything usable as a query filter: a prebuilt document (arbitrary
/// query), or a record reference (equality on every declared field —
/// `impl_record!` provides that impl).
pub trait IntoFilter {
    fn into_filter(self) -> Result<Document>;
}

impl IntoFilter for Document {
    fn into_filter(self) -> Result<Document> {
        Ok(self)
    }
}

impl IntoFilter for &Document {
    fn into_filter(self) -> Result<Document> {
        Ok(self.clone())
    }
}

// -- Typed facade -------------------------------------------------------------

/// CRUD/aggregate facade that accepts and returns records of type `T`,
/// converting through the mapper at every boundary.
pub struct TypedCollection<T> {
    raw: Box<dyn RawCollection>,
    _records: PhantomData<fn() -> T>,
}

impl<T: Record + Default> TypedCollection<T> {
    pub fn new(raw: Box<dyn RawCollection>) -> Self {
        TypedCollection {
            raw,
            _records: PhantomData,
        }
    }

    /// The wrapped collaborator, for operations outside the typed
    /// surface (e.g. feeding a `CollectionSink`).
    pub fn raw(&self) -> &dyn RawCollection {
        self.raw.as_ref()
    }

    pub fn raw_mut(&mut self) -> &mut dyn RawCollection {
        self.raw.as_mut()
    }

    /// Exact number of documents matching `filter`, under `options`.
    pub fn count(
        &self,
        filter: impl IntoFilter,
        options: impl Into<Option<CountOptions>>,
    ) -> Result<u64> {
        let filter = filter.into_filter()?;
        self.raw
            .count(&filter, &options.into().unwrap_or_default())
    }

    /// Lazy sequence of all matching records.
    pub fn find(&self, filter: impl IntoFilter) -> Result<DeserializingCursor<T>> {
        let filter = filter.into_filter()?;
        Ok(DeserializingCursor::new(self.raw.find(&filter)?))
    }

    pub fn find_one(&self, filter: impl IntoFilter) -> Result<Option<T>> {
        let filter = filter.into_filter()?;
        to_optional_record(self.raw.find_one(&filter)?)
    }

    /// Delete the first match and return its pre-deletion record.
    pub fn find_one_and_delete(&mut self, filter: impl IntoFilter) -> Result<Option<T>> {
        let filter = filter.into_filter()?;
        to_optional_record(self.raw.find_one_and_delete(&filter)?)
    }

    /// Replace the first match, returning the pre- or post-replacement
    /// record per `options`.
    pub fn find_one_and_replace(
        &mut self,
        filter: impl IntoFilter,
        replacement: &T,
        options: impl Into<Option<FindOneAndReplaceOptions>>,
    ) -> Result<Option<T>> {
        let filter = filter.into_filter()?;
        let replacement = to_document(replacement)?;
        let returned = self.raw.find_one_and_replace(
            &filter,
            replacement,
            &options.into().unwrap_or_default(),
        )?;
        to_optional_record(returned)
    }

    pub fn find_one_and_update(
        &mut self,
        filter: impl IntoFilter,
        update: &Document,
        options: impl Into<Option<FindOneAndUpdateOptions>>,
    ) -> Result<Option<T>> {
        let filter = filter.into_filter()?;
        let returned =
            self.raw
                .find_one_and_update(&filter, update, &options.into().unwrap_or_default())?;
        to_optional_record(returned)
    }

    pub fn insert_one(&mut self, record: &T) -> Result<Option<InsertOneResult>> {
        self.raw.insert_one(to_document(record)?)
    }

    /// Insert every record from a container or iterator range; both
    /// produce the same result semantics.
    pub fn insert_many<'a, I>(&mut self, records: I) -> Result<Option<InsertManyResult>>
    where
        T: 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let docs = records
            .into_iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;
        self.raw.insert_many(docs)
    }

    pub fn delete_one(&mut self, filter: impl IntoFilter) -> Result<Option<DeleteResult>> {
        let filter = filter.into_filter()?;
        self.raw.delete_one(&filter)
    }

    pub fn delete_many(&mut self, filter: impl IntoFilter) -> Result<Option<DeleteResult>> {
        let filter = filter.into_filter()?;
        self.raw.delete_many(&filter)
    }

    pub fn replace_one(
        &mut self,
        filter: impl IntoFilter,
        replacement: &T,
        options: impl Into<Option<ReplaceOptions>>,
    ) -> Result<Option<UpdateResult>> {
        let filter = filter.into_filter()?;
        let replacement = to_document(replacement)?;
        self.raw
            .replace_one(&filter, replacement, &options.into().unwrap_or_default())
    }

    pub fn update_one(
        &mut self,
        filter: impl IntoFilter,
        update: &Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<Option<UpdateResult>> {
        let filter = filter.into_filter()?;
        self.raw
            .update_one(&filter, update, &options.into().unwrap_or_default())
    }

    /// Like `update_one`, affecting every match.
    pub fn update_many(
        &mut self,
        filter: impl IntoFilter,
        update: &Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<Option<UpdateResult>> {
        let filter = filter.into_filter()?;
        self.raw
            .update_many(&filter, update, &options.into().unwrap_or_default())
    }

    /// Run a pipeline of store-native stages and deserialize each output
    /// document into `T`. The pipeline's output schema must be
    /// structurally compatible with `T` or per-item deserialization
    /// fails.
    pub fn aggregate(&self, pipeline: &[Document]) -> Result<DeserializingCursor<T>> {
        Ok(DeserializingCursor::new(self.raw.aggregate(pipeline)?))
    }
}
