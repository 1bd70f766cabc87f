use crate::catalog::RecordId;
use crate::inventory::Inventory;
use ahash::AHashMap;
use std::collections::BTreeMap;

/// path → ascending ids of every record pointing at it, for paths shared by
/// two or more records. Keys iterate in ascending path order.
pub type LintedGroups = BTreeMap<String, Vec<RecordId>>;

/// Group records that point at an identical path.
///
/// Algorithm:
/// 1. Count occurrences per path, remembering first-occurrence order
/// 2. Visit paths by descending count (ties keep first-occurrence order)
/// 3. Consume every remaining record of a path with count ≥ 2
/// 4. Stop at the first path below 2; everything after it is below 2 as well
///
/// Against a consolidated catalog this yields the linted groups. Before any
/// file-level dedup it yields records duplicated without duplicating files.
pub fn group_records_by_path(inventory: &Inventory) -> LintedGroups {
    let mut first_seen: Vec<&str> = Vec::new();
    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    for (_, path) in inventory.iter() {
        let count = counts.entry(path).or_insert(0);
        if *count == 0 {
            first_seen.push(path);
        }
        *count += 1;
    }

    let mut counted: Vec<(&str, usize)> = first_seen
        .into_iter()
        .map(|path| (path, counts.get(path).copied().unwrap_or(0)))
        .collect();
    counted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut remaining = inventory.path_index();
    let mut out = LintedGroups::new();
    for (path, count) in counted {
        if count < 2 {
            break;
        }
        out.insert(path.to_string(), remaining.drain(path));
    }
    out
}

/// The record every other member of a linted group defers to: the oldest.
pub fn primary_record(ids: &[RecordId]) -> Option<RecordId> {
    ids.iter().copied().min()
}
