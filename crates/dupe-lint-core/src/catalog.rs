//! Collaborator seams.
//!
//! The engine never talks to a database directly. Everything it reads from or
//! writes to the catalog goes through [`Catalog`], and every textual reference
//! fix-up goes through [`ReferenceRewriter`]. `storage::Database` implements
//! both over SQLite.

use crate::error::Error;

pub type RecordId = i64;

/// A catalog entry: an id and the file path (relative to the upload root) it
/// points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub path: String,
}

impl Record {
    pub fn new(id: RecordId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    pub record_id: RecordId,
    pub key: String,
    pub value: String,
}

pub trait Catalog {
    /// All records, ascending by id.
    fn list_records(&self) -> Result<Vec<Record>, Error>;

    fn update_path(&self, ids: &[RecordId], new_path: &str) -> Result<usize, Error>;

    fn update_derived_metadata(&self, id: RecordId, blob: &str) -> Result<(), Error>;

    /// Points every id at `new_path` and stores `blob` as its derived
    /// metadata. Implementations backed by a transactional store must apply
    /// all of it or none of it; the default does neither.
    fn repoint(&self, ids: &[RecordId], new_path: &str, blob: &str) -> Result<usize, Error> {
        let moved = self.update_path(ids, new_path)?;
        for id in ids {
            self.update_derived_metadata(*id, blob)?;
        }
        Ok(moved)
    }

    /// Removes every metadata row stored under `key`. Returns the row count.
    fn delete_metadata(&self, key: &str) -> Result<usize, Error>;

    fn insert_metadata(&self, rows: &[MetadataRow]) -> Result<usize, Error>;
}

pub trait ReferenceRewriter {
    /// Cheap probe: could `needle` be referenced anywhere?
    fn exists_anywhere(&self, needle: &str) -> Result<bool, Error>;

    /// Replaces every textual occurrence of `from` with `to`. Returns the
    /// number of rows touched.
    fn rewrite(&self, from: &str, to: &str) -> Result<usize, Error>;
}
