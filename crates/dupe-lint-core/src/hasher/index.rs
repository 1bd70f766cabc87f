use super::xxhash::{self, Digest};
use crate::inventory::Inventory;
use crate::progress::ProgressReporter;
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// digest → every distinct catalog path whose file hashed to it.
///
/// Each entry's paths are sorted and deduplicated, and entries iterate in
/// ascending digest order, so the index is identical no matter how the
/// hashing work was scheduled.
#[derive(Debug, Clone, Default)]
pub struct ChecksumIndex {
    entries: BTreeMap<Digest, Vec<String>>,
}

/// Content shared by two or more distinct paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub digest: Digest,
    pub paths: Vec<String>,
}

impl DuplicateGroup {
    /// Files that would be removed if one copy were kept.
    pub fn redundant_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

impl ChecksumIndex {
    pub fn from_entries(entries: impl IntoIterator<Item = (Digest, Vec<String>)>) -> Self {
        let mut sorted: BTreeMap<Digest, Vec<String>> = BTreeMap::new();
        for (digest, paths) in entries {
            sorted.entry(digest).or_default().extend(paths);
        }
        for paths in sorted.values_mut() {
            paths.sort();
            paths.dedup();
        }
        Self { entries: sorted }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, digest: &Digest) -> Option<&[String]> {
        self.entries.get(digest).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &[String])> {
        self.entries.iter().map(|(d, p)| (d, p.as_slice()))
    }

    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        self.entries
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(digest, paths)| DuplicateGroup {
                digest: *digest,
                paths: paths.clone(),
            })
            .collect()
    }
}

/// Hash every file the inventory references, in parallel.
///
/// Files that cannot be read are left out of the index: a missing file can't
/// be a member of a duplicate group.
pub fn build_checksum_index(
    root: &Path,
    inventory: &Inventory,
    reporter: &dyn ProgressReporter,
) -> ChecksumIndex {
    let mut paths: Vec<&str> = inventory.iter().map(|(_, path)| path).collect();
    paths.sort_unstable();
    paths.dedup();

    let total = paths.len();
    reporter.on_hash_start(total);

    let digest_to_paths: DashMap<Digest, Vec<String>> = DashMap::new();
    let hashed = AtomicUsize::new(0);

    paths.par_iter().for_each(|relative| {
        match xxhash::hash_file(&root.join(relative)) {
            Ok(digest) => digest_to_paths
                .entry(digest)
                .or_default()
                .push(relative.to_string()),
            Err(e) => debug!("Skipping unreadable file '{}': {}", relative, e),
        }
        let done = hashed.fetch_add(1, Ordering::Relaxed) + 1;
        reporter.on_hash_progress(done, total);
    });

    ChecksumIndex::from_entries(digest_to_paths)
}
