//! In-memory document collection
//!
//! A [`RawCollection`] backed by a `Vec<Document>` in insertion order.
//! Queries are linear scans, which is the right trade for the
//! test-sized collections this store exists to serve.
//!
//! Query support: equality on every filter key, plus operator clauses
//! `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`. Updates are operator
//! documents (`$set`, `$inc`, `$unset`). Aggregation supports `$match`
//! and `$group` with `$sum` accumulators. Anything else is rejected as
//! a store error rather than silently ignored.

use std::cmp::Ordering;

use tracing::debug;

use crate::collection::{
    CountOptions, DeleteResult, FindOneAndReplaceOptions, FindOneAndUpdateOptions,
    InsertManyResult, InsertOneResult, RawCollection, RawCursor, ReplaceOptions, ReturnDocument,
    UpdateOptions, UpdateResult,
};
use crate::document::{Document, ObjectId, Value};
use crate::error::{OdmError, Result};

/// Insertion-ordered in-memory document store.
#[derive(Default)]
pub struct MemoryCollection {
    docs: Vec<Document>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }

    /// Snapshot of all stored documents, in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    fn first_match(&self, filter: &Document) -> Result<Option<usize>> {
        for (idx, doc) in self.docs.iter().enumerate() {
            if matches(doc, filter)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    fn matching_indices(&self, filter: &Document) -> Result<Vec<usize>> {
        let mut hits = Vec::new();
        for (idx, doc) in self.docs.iter().enumerate() {
            if matches(doc, filter)? {
                hits.push(idx);
            }
        }
        Ok(hits)
    }

    /// Store `doc`, assigning a generated `_id` (first in key order) when
    /// absent. Duplicate explicit `_id`s are rejected.
    fn store(&mut self, doc: Document) -> Result<Value> {
        let doc = ensure_id(doc);
        let id = doc
            .get("_id")
            .cloned()
            .unwrap_or(Value::Null);
        for existing in &self.docs {
            if existing.get("_id") == Some(&id) {
                return Err(OdmError::Store(format!("duplicate _id: {:?}", id)));
            }
        }
        self.docs.push(doc);
        Ok(id)
    }

    fn upsert_from_filter(&mut self, filter: &Document, update: &Document) -> Result<Value> {
        let mut base: Document = filter
            .iter()
            .filter(|(_, v)| !is_operator_clause_value(v))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        apply_update(&mut base, update)?;
        self.store(base)
    }
}

impl RawCollection for MemoryCollection {
    fn count(&self, filter: &Document, options: &CountOptions) -> Result<u64> {
        let total = self.matching_indices(filter)?.len() as u64;
        let after_skip = total.saturating_sub(options.skip.unwrap_or(0));
        Ok(match options.limit {
            Some(limit) => after_skip.min(limit),
            None => after_skip,
        })
    }

    fn find(&self, filter: &Document) -> Result<RawCursor> {
        let hits = self.matching_indices(filter)?;
        let docs: Vec<Document> = hits.into_iter().map(|i| self.docs[i].clone()).collect();
        Ok(RawCursor::from_documents(docs))
    }

    fn find_one(&self, filter: &Document) -> Result<Option<Document>> {
        Ok(self.first_match(filter)?.map(|i| self.docs[i].clone()))
    }

    fn find_one_and_delete(&mut self, filter: &Document) -> Result<Option<Document>> {
        match self.first_match(filter)? {
            Some(idx) => {
                let doc = self.docs.remove(idx);
                debug!(remaining = self.docs.len(), "find_one_and_delete removed document");
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn find_one_and_replace(
        &mut self,
        filter: &Document,
        replacement: Document,
        options: &FindOneAndReplaceOptions,
    ) -> Result<Option<Document>> {
        match self.first_match(filter)? {
            Some(idx) => {
                let before = self.docs[idx].clone();
                let after = with_preserved_id(&before, replacement)?;
                self.docs[idx] = after.clone();
                Ok(Some(match options.return_document {
                    ReturnDocument::Before => before,
                    ReturnDocument::After => after,
                }))
            }
            None => Ok(None),
        }
    }

    fn find_one_and_update(
        &mut self,
        filter: &Document,
        update: &Document,
        options: &FindOneAndUpdateOptions,
    ) -> Result<Option<Document>> {
        match self.first_match(filter)? {
            Some(idx) => {
                let before = self.docs[idx].clone();
                apply_update(&mut self.docs[idx], update)?;
                Ok(Some(match options.return_document {
                    ReturnDocument::Before => before,
                    ReturnDocument::After => self.docs[idx].clone(),
                }))
            }
            None => Ok(None),
        }
    }

    fn insert_one(&mut self, doc: Document) -> Result<Option<InsertOneResult>> {
        let inserted_id = self.store(doc)?;
        debug!(total = self.docs.len(), "insert_one");
        Ok(Some(InsertOneResult { inserted_id }))
    }

    fn insert_many(&mut self, docs: Vec<Document>) -> Result<Option<InsertManyResult>> {
        let mut inserted_ids = Vec::with_capacity(docs.len());
        for doc in docs {
            inserted_ids.push(self.store(doc)?);
        }
        debug!(count = inserted_ids.len(), "insert_many");
        Ok(Some(InsertManyResult {
            inserted_count: inserted_ids.len() as u64,
            inserted_ids,
        }))
    }

    fn delete_one(&mut self, filter: &Document) -> Result<Option<DeleteResult>> {
        match self.first_match(filter)? {
            Some(idx) => {
                self.docs.remove(idx);
                debug!(remaining = self.docs.len(), "delete_one");
                Ok(Some(DeleteResult { deleted_count: 1 }))
            }
            None => Ok(None),
        }
    }

    fn delete_many(&mut self, filter: &Document) -> Result<Option<DeleteResult>> {
        let hits = self.matching_indices(filter)?;
        if hits.is_empty() {
            return Ok(None);
        }
        // Remove back-to-front so indices stay valid.
        for idx in hits.iter().rev() {
            self.docs.remove(*idx);
        }
        debug!(deleted = hits.len(), remaining = self.docs.len(), "delete_many");
        Ok(Some(DeleteResult {
            deleted_count: hits.len() as u64,
        }))
    }

    fn replace_one(
        &mut self,
        filter: &Document,
        replacement: Document,
        options: &ReplaceOptions,
    ) -> Result<Option<UpdateResult>> {
        match self.first_match(filter)? {
            Some(idx) => {
                let after = with_preserved_id(&self.docs[idx], replacement)?;
                let modified = u64::from(self.docs[idx] != after);
                self.docs[idx] = after;
                Ok(Some(UpdateResult {
                    matched_count: 1,
                    modified_count: modified,
                    upserted_id: None,
                }))
            }
            None if options.upsert => {
                let id = self.store(replacement)?;
                Ok(Some(UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                }))
            }
            None => Ok(None),
        }
    }

    fn update_one(
        &mut self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<Option<UpdateResult>> {
        match self.first_match(filter)? {
            Some(idx) => {
                let changed = apply_update(&mut self.docs[idx], update)?;
                Ok(Some(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(changed),
                    upserted_id: None,
                }))
            }
            None if options.upsert => {
                let id = self.upsert_from_filter(filter, update)?;
                Ok(Some(UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                }))
            }
            None => Ok(None),
        }
    }

    fn update_many(
        &mut self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<Option<UpdateResult>> {
        let hits = self.matching_indices(filter)?;
        if hits.is_empty() {
            if options.upsert {
                let id = self.upsert_from_filter(filter, update)?;
                return Ok(Some(UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                }));
            }
            return Ok(None);
        }

        let mut modified = 0;
        for idx in &hits {
            if apply_update(&mut self.docs[*idx], update)? {
                modified += 1;
            }
        }
        debug!(matched = hits.len(), modified, "update_many");
        Ok(Some(UpdateResult {
            matched_count: hits.len() as u64,
            modified_count: modified,
            upserted_id: None,
        }))
    }

    fn aggregate(&self, pipeline: &[Document]) -> Result<RawCursor> {
        let mut current = self.docs.clone();
        for stage in pipeline {
            current = apply_stage(current, stage)?;
        }
        Ok(RawCursor::from_documents(current))
    }
}

// -- Document identity --------------------------------------------------------

/// Give the document an `_id`, generated and first in key order when the
/// caller did not provide one.
fn ensure_id(doc: Document) -> Document {
    if doc.contains_key("_id") {
        return doc;
    }
    let mut with_id = Document::new();
    with_id.insert("_id", ObjectId::new());
    for (key, value) in doc {
        with_id.insert(key, value);
    }
    with_id
}

/// Carry the stored document's `_id` into its replacement. A replacement
/// carrying a different `_id` is rejected.
fn with_preserved_id(existing: &Document, replacement: Document) -> Result<Document> {
    let id = match existing.get("_id") {
        Some(id) => id.clone(),
        None => return Ok(replacement),
    };
    if let Some(replacement_id) = replacement.get("_id") {
        if *replacement_id != id {
            return Err(OdmError::Store("the _id field is immutable".into()));
        }
    }
    let mut out = Document::new();
    out.insert("_id", id);
    for (key, value) in replacement {
        out.insert(key, value);
    }
    Ok(out)
}

// -- Filter evaluation --------------------------------------------------------

fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter.iter() {
        let hit = match condition {
            Value::Document(clause) if is_operator_clause(clause) => {
                eval_operator_clause(doc.get(key), clause)?
            }
            literal => doc.get(key).is_some_and(|v| values_equal(v, literal)),
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_clause(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn is_operator_clause_value(value: &Value) -> bool {
    matches!(value, Value::Document(d) if is_operator_clause(d))
}

fn eval_operator_clause(field: Option<&Value>, clause: &Document) -> Result<bool> {
    for (op, operand) in clause.iter() {
        let hit = match op {
            "$eq" => field.is_some_and(|f| values_equal(f, operand)),
            "$ne" => !field.is_some_and(|f| values_equal(f, operand)),
            "$gt" => ordering_matches(field, operand, &[Ordering::Greater]),
            "$gte" => ordering_matches(field, operand, &[Ordering::Greater, Ordering::Equal]),
            "$lt" => ordering_matches(field, operand, &[Ordering::Less]),
            "$lte" => ordering_matches(field, operand, &[Ordering::Less, Ordering::Equal]),
            other => {
                return Err(OdmError::Store(format!(
                    "unsupported filter operator '{}'",
                    other
                )))
            }
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

fn ordering_matches(field: Option<&Value>, operand: &Value, accepted: &[Ordering]) -> bool {
    field
        .and_then(|f| compare_values(f, operand))
        .is_some_and(|ord| accepted.contains(&ord))
}

/// Equality across numeric representations: int32 1 == int64 1 == 1.0.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// -- Update evaluation --------------------------------------------------------

/// Apply an operator-style update document in place. Returns whether the
/// document actually changed.
fn apply_update(doc: &mut Document, update: &Document) -> Result<bool> {
    let mut changed = false;
    for (op, args) in update.iter() {
        // Key shape first: a plain field name is a different mistake
        // than a malformed operator argument.
        if !op.starts_with('$') {
            return Err(OdmError::Store(
                "update documents must use operators; use replace_one for full replacement"
                    .into(),
            ));
        }
        let args = args.as_document().ok_or_else(|| {
            OdmError::Store(format!("update operator '{}' expects a document", op))
        })?;
        match op {
            "$set" => {
                for (key, value) in args.iter() {
                    guard_id_mutation(key)?;
                    if doc.get(key) != Some(value) {
                        doc.insert(key, value.clone());
                        changed = true;
                    }
                }
            }
            "$inc" => {
                for (key, delta) in args.iter() {
                    guard_id_mutation(key)?;
                    if delta.as_number().is_none() {
                        return Err(OdmError::Store(format!(
                            "$inc of field '{}' requires a numeric argument",
                            key
                        )));
                    }
                    let current = doc.get(key).cloned();
                    match current {
                        Some(value) => {
                            let next = numeric_add(&value, delta, key)?;
                            if next != value {
                                doc.insert(key, next);
                                changed = true;
                            }
                        }
                        None => {
                            doc.insert(key, delta.clone());
                            changed = true;
                        }
                    }
                }
            }
            "$unset" => {
                for (key, _) in args.iter() {
                    guard_id_mutation(key)?;
                    if doc.remove(key).is_some() {
                        changed = true;
                    }
                }
            }
            other => {
                return Err(OdmError::Store(format!(
                    "unsupported update operator '{}'",
                    other
                )))
            }
        }
    }
    Ok(changed)
}

fn guard_id_mutation(key: &str) -> Result<()> {
    if key == "_id" {
        return Err(OdmError::Store("the _id field is immutable".into()));
    }
    Ok(())
}

/// Add two numeric values, keeping the narrowest representation that
/// holds both operands. Integer overflow is a store error.
fn numeric_add(current: &Value, delta: &Value, field: &str) -> Result<Value> {
    use Value::{Double, Int32, Int64};

    let overflow =
        || OdmError::Store(format!("integer overflow incrementing field '{}'", field));

    match (current, delta) {
        (Int32(a), Int32(b)) => a.checked_add(*b).map(Int32).ok_or_else(overflow),
        (Int32(a), Int64(b)) => i64::from(*a).checked_add(*b).map(Int64).ok_or_else(overflow),
        (Int64(a), Int32(b)) => a.checked_add(i64::from(*b)).map(Int64).ok_or_else(overflow),
        (Int64(a), Int64(b)) => a.checked_add(*b).map(Int64).ok_or_else(overflow),
        (Double(a), other) if other.as_number().is_some() => {
            Ok(Double(a + other.as_number().unwrap_or(0.0)))
        }
        (other, Double(b)) if other.as_number().is_some() => {
            Ok(Double(other.as_number().unwrap_or(0.0) + b))
        }
        _ => Err(OdmError::Store(format!(
            "cannot $inc non-numeric field '{}'",
            field
        ))),
    }
}

// -- Aggregation --------------------------------------------------------------

fn apply_stage(input: Vec<Document>, stage: &Document) -> Result<Vec<Document>> {
    let mut elements = stage.iter();
    let (op, args) = match (elements.next(), elements.next()) {
        (Some(first), None) => first,
        _ => {
            return Err(OdmError::Store(
                "each pipeline stage must hold exactly one operator".into(),
            ))
        }
    };
    match op {
        "$match" => {
            let filter = args.as_document().ok_or_else(|| {
                OdmError::Store("$match stage expects a filter document".into())
            })?;
            let mut out = Vec::new();
            for doc in input {
                if matches(&doc, filter)? {
                    out.push(doc);
                }
            }
            Ok(out)
        }
        "$group" => {
            let spec = args.as_document().ok_or_else(|| {
                OdmError::Store("$group stage expects a specification document".into())
            })?;
            group_stage(input, spec)
        }
        other => Err(OdmError::Store(format!(
            "unsupported pipeline stage '{}'",
            other
        ))),
    }
}

/// `$group` with `$sum` accumulators. `_id` may be a constant or a
/// `"$field"` path; groups emerge in first-seen order.
fn group_stage(input: Vec<Document>, spec: &Document) -> Result<Vec<Document>> {
    let id_expr = spec
        .get("_id")
        .ok_or_else(|| OdmError::Store("$group requires an _id expression".into()))?;

    let mut accumulators: Vec<(String, Value)> = Vec::new();
    for (name, acc) in spec.iter() {
        if name == "_id" {
            continue;
        }
        let acc_doc = acc.as_document().ok_or_else(|| {
            OdmError::Store(format!("accumulator '{}' expects a document", name))
        })?;
        let operand = match acc_doc.get("$sum") {
            Some(operand) if acc_doc.len() == 1 => operand.clone(),
            _ => {
                return Err(OdmError::Store(format!(
                    "accumulator '{}' must be a single $sum expression",
                    name
                )))
            }
        };
        accumulators.push((name.to_string(), operand));
    }

    // Group keys compared linearly; result sets are small by design.
    let mut groups: Vec<(Value, Document)> = Vec::new();
    for doc in &input {
        let key = resolve_expr(doc, id_expr);
        let idx = match groups.iter().position(|(k, _)| values_equal(k, &key)) {
            Some(idx) => idx,
            None => {
                let mut out = Document::new();
                out.insert("_id", key.clone());
                for (name, _) in &accumulators {
                    out.insert(name.clone(), Value::Int32(0));
                }
                groups.push((key, out));
                groups.len() - 1
            }
        };

        for (name, operand) in &accumulators {
            let contribution = resolve_expr(doc, operand);
            // $sum ignores non-numeric contributions.
            if contribution.as_number().is_none() {
                continue;
            }
            let total = groups[idx].1.get(name).cloned().unwrap_or(Value::Int32(0));
            let next = numeric_add(&total, &contribution, name)?;
            groups[idx].1.insert(name.clone(), next);
        }
    }
    Ok(groups.into_iter().map(|(_, doc)| doc).collect())
}

/// `"$field"` resolves against the document (missing → null); anything
/// else is a literal.
fn resolve_expr(doc: &Document, expr: &Value) -> Value {
    match expr {
        Value::String(path) => match path.strip_prefix('$') {
            Some(field) => doc.get(field).cloned().unwrap_or(Value::Null),
            None => expr.clone(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn seeded() -> MemoryCollection {
        let mut coll = MemoryCollection::new();
        coll.insert_one(doc! { "a" => 1, "b" => 4, "c" => 9 }).unwrap();
        coll.insert_one(doc! { "a" => 1, "b" => 4, "c" => 900 }).unwrap();
        coll.insert_one(doc! { "a" => 2, "b" => 5, "c" => 25 }).unwrap();
        coll
    }

    #[test]
    fn test_insert_generates_id_first() {
        let mut coll = MemoryCollection::new();
        let res = coll.insert_one(doc! { "a" => 1 }).unwrap().unwrap();
        assert!(matches!(res.inserted_id, Value::ObjectId(_)));

        let stored = &coll.documents()[0];
        assert_eq!(stored.keys().next(), Some("_id"));
        assert_eq!(stored.get("_id"), Some(&res.inserted_id));
    }

    #[test]
    fn test_insert_keeps_explicit_id() {
        let mut coll = MemoryCollection::new();
        let res = coll
            .insert_one(doc! { "_id" => 7, "a" => 1 })
            .unwrap()
            .unwrap();
        assert_eq!(res.inserted_id, Value::Int32(7));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut coll = MemoryCollection::new();
        coll.insert_one(doc! { "_id" => 7 }).unwrap();
        let err = coll.insert_one(doc! { "_id" => 7 }).unwrap_err();
        assert!(matches!(err, OdmError::Store(_)), "{err}");
        assert_eq!(coll.len(), 1);
    }

    #[test]
    fn test_equality_filter_is_numeric_aware() {
        let coll = seeded();
        let opts = CountOptions::default();
        assert_eq!(coll.count(&doc! { "a" => 1i64 }, &opts).unwrap(), 2);
        assert_eq!(coll.count(&doc! { "a" => 1.0 }, &opts).unwrap(), 2);
        assert_eq!(coll.count(&doc! { "a" => 3 }, &opts).unwrap(), 0);
    }

    #[test]
    fn test_operator_filters() {
        let coll = seeded();
        let opts = CountOptions::default();
        let gt = Document::from_json(r#"{"c": {"$gt": 100}}"#).unwrap();
        assert_eq!(coll.count(&gt, &opts).unwrap(), 1);

        let range = Document::from_json(r#"{"c": {"$gte": 9, "$lt": 900}}"#).unwrap();
        assert_eq!(coll.count(&range, &opts).unwrap(), 2);

        let ne = Document::from_json(r#"{"a": {"$ne": 1}}"#).unwrap();
        assert_eq!(coll.count(&ne, &opts).unwrap(), 1);

        // $ne also matches documents missing the field entirely.
        let ne_missing = Document::from_json(r#"{"zzz": {"$ne": 1}}"#).unwrap();
        assert_eq!(coll.count(&ne_missing, &opts).unwrap(), 3);
    }

    #[test]
    fn test_unknown_filter_operator_is_error() {
        let coll = seeded();
        let bad = Document::from_json(r#"{"c": {"$regex": "x"}}"#).unwrap();
        let err = coll.count(&bad, &CountOptions::default()).unwrap_err();
        assert!(err.to_string().contains("$regex"), "{err}");
    }

    #[test]
    fn test_count_skip_and_limit() {
        let coll = seeded();
        let all = doc! {};
        assert_eq!(coll.count(&all, &CountOptions::default()).unwrap(), 3);
        assert_eq!(
            coll.count(&all, &CountOptions::default().limit(2)).unwrap(),
            2
        );
        assert_eq!(
            coll.count(&all, &CountOptions::default().skip(2)).unwrap(),
            1
        );
    }

    #[test]
    fn test_update_set_and_inc() {
        let mut coll = seeded();
        let update = Document::from_json(r#"{"$set": {"b": 10}, "$inc": {"c": 1}}"#).unwrap();
        let res = coll
            .update_one(&doc! { "a" => 1 }, &update, &UpdateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(res.matched_count, 1);
        assert_eq!(res.modified_count, 1);

        let doc = coll.find_one(&doc! { "b" => 10 }).unwrap().unwrap();
        assert_eq!(doc.get("c"), Some(&Value::Int32(10)));
    }

    #[test]
    fn test_update_many_counts_only_changes() {
        let mut coll = seeded();
        // a=1 docs already have b=4; setting b=4 modifies nothing.
        let update = Document::from_json(r#"{"$set": {"b": 4}}"#).unwrap();
        let res = coll
            .update_many(&doc! { "a" => 1 }, &update, &UpdateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(res.matched_count, 2);
        assert_eq!(res.modified_count, 0);
    }

    #[test]
    fn test_update_no_match_is_absent() {
        let mut coll = seeded();
        let update = Document::from_json(r#"{"$set": {"b": 1}}"#).unwrap();
        let res = coll
            .update_one(&doc! { "a" => 99 }, &update, &UpdateOptions::default())
            .unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn test_update_upsert_builds_from_filter() {
        let mut coll = MemoryCollection::new();
        let update = Document::from_json(r#"{"$set": {"b": 2}}"#).unwrap();
        let res = coll
            .update_one(
                &doc! { "a" => 1 },
                &update,
                &UpdateOptions::default().upsert(true),
            )
            .unwrap()
            .unwrap();
        assert!(res.upserted_id.is_some());
        assert_eq!(res.matched_count, 0);

        let stored = coll.find_one(&doc! { "a" => 1, "b" => 2 }).unwrap();
        assert!(stored.is_some());
    }

    #[test]
    fn test_non_operator_update_rejected() {
        let mut coll = seeded();
        // A plain key is rejected as a non-operator update whether its
        // value is a scalar or a document.
        for update in [doc! { "b" => 1 }, doc! { "b" => doc! { "x" => 1 } }] {
            let err = coll
                .update_one(&doc! { "a" => 1 }, &update, &UpdateOptions::default())
                .unwrap_err();
            assert!(err.to_string().contains("operators"), "{err}");
        }
    }

    #[test]
    fn test_operator_with_scalar_argument_rejected() {
        let mut coll = seeded();
        let err = coll
            .update_one(
                &doc! { "a" => 1 },
                &doc! { "$set" => 1 },
                &UpdateOptions::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("expects a document"), "{err}");
    }

    #[test]
    fn test_inc_non_numeric_field_rejected() {
        let mut coll = MemoryCollection::new();
        coll.insert_one(doc! { "a" => "text" }).unwrap();
        let update = Document::from_json(r#"{"$inc": {"a": 1}}"#).unwrap();
        let err = coll
            .update_one(&doc! {}, &update, &UpdateOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("non-numeric"), "{err}");
    }

    #[test]
    fn test_replace_preserves_id() {
        let mut coll = MemoryCollection::new();
        let inserted = coll
            .insert_one(doc! { "a" => 1 })
            .unwrap()
            .unwrap();
        let res = coll
            .replace_one(
                &doc! { "a" => 1 },
                doc! { "a" => 2 },
                &ReplaceOptions::default(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(res.matched_count, 1);
        assert_eq!(res.modified_count, 1);

        let stored = &coll.documents()[0];
        assert_eq!(stored.get("_id"), Some(&inserted.inserted_id));
        assert_eq!(stored.get("a"), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_replace_with_conflicting_id_rejected() {
        let mut coll = MemoryCollection::new();
        coll.insert_one(doc! { "_id" => 1, "a" => 1 }).unwrap();
        let err = coll
            .replace_one(
                &doc! { "a" => 1 },
                doc! { "_id" => 2, "a" => 2 },
                &ReplaceOptions::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("immutable"), "{err}");
    }

    #[test]
    fn test_aggregate_match_then_group() {
        let coll = seeded();
        let pipeline = vec![
            Document::from_json(r#"{"$match": {"a": 1}}"#).unwrap(),
            Document::from_json(r#"{"$group": {"_id": "$a", "c": {"$sum": "$c"}}}"#).unwrap(),
        ];
        let results: Vec<Document> = coll
            .aggregate(&pipeline)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("_id"), Some(&Value::Int32(1)));
        assert_eq!(results[0].get("c"), Some(&Value::Int32(909)));
    }

    #[test]
    fn test_aggregate_group_constant_id_and_literal_sum() {
        let coll = seeded();
        let pipeline =
            vec![Document::from_json(r#"{"$group": {"_id": "all", "n": {"$sum": 1}}}"#).unwrap()];
        let results: Vec<Document> = coll
            .aggregate(&pipeline)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("_id"), Some(&Value::String("all".into())));
        assert_eq!(results[0].get("n"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_aggregate_unknown_stage_rejected() {
        let coll = seeded();
        let pipeline = vec![Document::from_json(r#"{"$lookup": {}}"#).unwrap()];
        assert!(coll.aggregate(&pipeline).is_err());
    }
}
