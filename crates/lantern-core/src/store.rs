//! Ordered text records, one per indexed vector.
//!
//! Record `i` belongs to vector `i` in [`VectorIndex`](crate::vector_index::VectorIndex).
//! Append is the only mutation; identities are never reused.

use serde::{Deserialize, Serialize};

/// A stored text. Serialized as `{ "text": ... }` in the metadata artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub text: String,
}

/// Append-only list of document records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStore {
    records: Vec<DocumentRecord>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub(crate) fn from_records(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }

    /// Append a text and return its identity (its position).
    pub fn append(&mut self, text: impl Into<String>) -> usize {
        let identity = self.records.len();
        self.records.push(DocumentRecord { text: text.into() });
        identity
    }

    /// Text stored at `identity`.
    pub fn get(&self, identity: usize) -> Result<&str, StoreError> {
        self.records
            .get(identity)
            .map(|r| r.text.as_str())
            .ok_or(StoreError::OutOfRange {
                identity,
                len: self.records.len(),
            })
    }

    /// `(identity, text)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r.text.as_str()))
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("identity {identity} out of range (store holds {len} records)")]
    OutOfRange { identity: usize, len: usize },
}
