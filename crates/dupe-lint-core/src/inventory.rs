use crate::catalog::{Catalog, Record, RecordId};
use crate::error::Error;
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Cached copy of the catalog's id → path mapping, ascending by id.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: BTreeMap<RecordId, String>,
}

impl Inventory {
    pub fn load<C: Catalog + ?Sized>(catalog: &C) -> Result<Self, Error> {
        let inventory = Self::from_records(catalog.list_records()?);
        debug!("Loaded {} catalog records", inventory.len());
        Ok(inventory)
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id, r.path)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &str)> {
        self.records.iter().map(|(id, path)| (*id, path.as_str()))
    }

    /// Every distinct path referenced by at least one record.
    pub fn official_paths(&self) -> AHashSet<&str> {
        self.records.values().map(String::as_str).collect()
    }

    pub fn path_index(&self) -> PathIndex {
        PathIndex::from_inventory(self)
    }
}

/// Owned path → ids multimap. Ids are consumed as they are matched, lowest id
/// first, so a record can never be counted twice within one run.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    by_path: AHashMap<String, VecDeque<RecordId>>,
}

impl PathIndex {
    pub fn from_inventory(inventory: &Inventory) -> Self {
        let mut by_path: AHashMap<String, VecDeque<RecordId>> = AHashMap::new();
        for (id, path) in inventory.iter() {
            by_path.entry(path.to_string()).or_default().push_back(id);
        }
        Self { by_path }
    }

    pub fn count(&self, path: &str) -> usize {
        self.by_path.get(path).map_or(0, VecDeque::len)
    }

    pub fn pop(&mut self, path: &str) -> Option<RecordId> {
        let ids = self.by_path.get_mut(path)?;
        let id = ids.pop_front();
        if ids.is_empty() {
            self.by_path.remove(path);
        }
        id
    }

    pub fn drain(&mut self, path: &str) -> Vec<RecordId> {
        let mut out = Vec::with_capacity(self.count(path));
        while let Some(id) = self.pop(path) {
            out.push(id);
        }
        out
    }

    pub fn remaining(&self) -> usize {
        self.by_path.values().map(VecDeque::len).sum()
    }
}
