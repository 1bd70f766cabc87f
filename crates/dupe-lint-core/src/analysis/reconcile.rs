use super::linted::{primary_record, LintedGroups};
use crate::catalog::{Catalog, MetadataRow};
use crate::error::Error;
use tracing::{debug, info};

/// Metadata key under which every merged record points at its group's
/// primary record id.
pub const MERGE_META_KEY: &str = "_dupe_lint_primary";

/// One row per non-primary member of every linted group.
pub fn merge_metadata_rows(linted: &LintedGroups) -> Vec<MetadataRow> {
    let mut rows = Vec::new();
    for ids in linted.values() {
        let Some(primary) = primary_record(ids) else {
            continue;
        };
        rows.extend(ids.iter().filter(|id| **id != primary).map(|id| MetadataRow {
            record_id: *id,
            key: MERGE_META_KEY.to_string(),
            value: primary.to_string(),
        }));
    }
    rows
}

/// Replace all merge metadata with rows derived from `linted`.
///
/// Inserts are chunked by `batch_size`; the final state is the same as a
/// single write.
pub fn rebuild_merge_metadata<C: Catalog + ?Sized>(
    catalog: &C,
    linted: &LintedGroups,
    batch_size: usize,
) -> Result<usize, Error> {
    let removed = catalog.delete_metadata(MERGE_META_KEY)?;
    debug!("Removed {} stale merge metadata rows", removed);

    let rows = merge_metadata_rows(linted);
    let mut inserted = 0;
    for chunk in rows.chunks(batch_size.max(1)) {
        inserted += catalog.insert_metadata(chunk)?;
    }

    info!(
        "Merge metadata rebuilt: {} rows for {} linted groups",
        inserted,
        linted.len()
    );
    Ok(inserted)
}
