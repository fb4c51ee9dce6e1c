//! The document store the handlers write through.
//!
//! [`DocumentStore`] is the small set of primitives the engine needs: point
//! lookup, scan, insert, single-document atomic update and batched updates.
//! [`MemoryStore`] keeps a collection in memory and is the basis of the
//! file-backed [`JsonlStore`](crate::JsonlStore).

use crate::Document;
use crate::error::Result;
use crate::path;
use serde_json::Value;
use std::fmt;
use ulid::Ulid;

/// Name of the store-assigned document key.
pub const ID_FIELD: &str = "_id";

/// Store-assigned document identifier.
pub type DocId = String;

/// Equality match on dot paths. Empty criteria match every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(Document);

impl Criteria {
    /// Criteria matching every document.
    pub fn all() -> Self {
        Criteria::default()
    }

    /// Match documents whose `path` equals `value`.
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Criteria::all().and(path, value)
    }

    /// Add another equality condition.
    pub fn and(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| path::get(doc, field) == Some(expected))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Document> for Criteria {
    fn from(map: Document) -> Self {
        Criteria(map)
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// A single-document modification: unset paths, then set paths.
///
/// The engine always submits a field change together with the document's
/// new `log` in one `Update`, so the two can never be persisted apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Vec<(String, Value)>,
    pub unset: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Update::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set.push((path.into(), value));
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.push(path.into());
        self
    }

    /// Apply to an in-memory document.
    pub fn apply(&self, doc: &mut Document) {
        for field in &self.unset {
            path::delete(doc, field);
        }
        for (field, value) in &self.set {
            path::set(doc, field, value.clone());
        }
    }
}

/// One operation inside a [`DocumentStore::bulk_write`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    UpdateOne { criteria: Criteria, update: Update },
}

/// The storage primitives the engine is written against.
///
/// Only single-document writes are atomic. A bulk write is a sequence of
/// independent single-document writes; nothing is rolled back if one fails
/// part way.
pub trait DocumentStore {
    /// First document matching `criteria`, in insertion order.
    fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>>;

    /// Every document matching `criteria`, in insertion order. Each call
    /// takes a fresh snapshot.
    fn find_many(&self, criteria: &Criteria) -> Result<Vec<Document>>;

    /// Insert a document, assigning an `_id` when it has none.
    fn insert_one(&mut self, doc: Document) -> Result<DocId>;

    fn insert_many(&mut self, docs: Vec<Document>) -> Result<Vec<DocId>> {
        docs.into_iter().map(|doc| self.insert_one(doc)).collect()
    }

    /// Atomically apply `update` to the first document matching `criteria`.
    /// Returns 1 if the document changed, 0 otherwise.
    fn update_one(&mut self, criteria: &Criteria, update: &Update) -> Result<u64>;

    /// Apply `ops` in order; returns the number of documents changed.
    fn bulk_write(&mut self, ops: Vec<WriteOp>) -> Result<u64> {
        let mut modified = 0;
        for op in ops {
            match op {
                WriteOp::UpdateOne { criteria, update } => {
                    modified += self.update_one(&criteria, &update)?;
                }
            }
        }
        Ok(modified)
    }
}

/// An in-memory collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Vec<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Wrap documents that already carry their `_id`.
    pub fn from_documents(docs: Vec<Document>) -> Self {
        MemoryStore { docs }
    }

    /// All documents, in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>> {
        Ok(self.docs.iter().find(|doc| criteria.matches(doc)).cloned())
    }

    fn find_many(&self, criteria: &Criteria) -> Result<Vec<Document>> {
        Ok(self
            .docs
            .iter()
            .filter(|doc| criteria.matches(doc))
            .cloned()
            .collect())
    }

    fn insert_one(&mut self, mut doc: Document) -> Result<DocId> {
        let id = match doc.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => {
                let id = Ulid::new().to_string();
                doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };
        self.docs.push(doc);
        Ok(id)
    }

    fn update_one(&mut self, criteria: &Criteria, update: &Update) -> Result<u64> {
        let Some(doc) = self.docs.iter_mut().find(|doc| criteria.matches(doc)) else {
            return Ok(0);
        };
        let mut updated = doc.clone();
        update.apply(&mut updated);
        if updated == *doc {
            return Ok(0);
        }
        *doc = updated;
        Ok(1)
    }
}
