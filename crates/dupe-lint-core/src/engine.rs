use crate::analysis::{self, group_records_by_path, sister_files, LintedGroups};
use crate::catalog::{Catalog, RecordId, ReferenceRewriter};
use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher::{build_checksum_index, ChecksumIndex, Digest, DuplicateGroup};
use crate::inventory::{Inventory, PathIndex};
use crate::metadata;
use crate::path_parts::PathParts;
use crate::progress::ProgressReporter;
use ahash::AHashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One run's worth of state: the cached inventory and checksum index, plus
/// the collaborators every mutation goes through.
///
/// Not meant to be shared. Consolidation consumes records from its own
/// snapshot as it goes.
pub struct DedupeEngine<'a, C: ?Sized, R: ?Sized> {
    catalog: &'a C,
    rewriter: &'a R,
    root: PathBuf,
    ignore_patterns: Vec<String>,
    metadata_batch_size: usize,
    inventory: Option<Inventory>,
    checksums: Option<ChecksumIndex>,
}

/// What consolidating one duplicate group will do. Produced without touching
/// the catalog or the file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub digest: Digest,
    pub primary: String,
    pub dupes: Vec<String>,
    /// Every on-disk variant of every dupe, in deletion order.
    pub stale_files: Vec<String>,
    /// Consumption order: dupes' records first, then the primary's.
    pub affected_record_ids: Vec<RecordId>,
    /// Two or more previously consolidated groups collide in this one.
    pub merges_linted: bool,
}

impl GroupPlan {
    /// The oldest affected record.
    pub fn metadata_source(&self) -> Option<RecordId> {
        self.affected_record_ids.iter().copied().min()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub bytes_saved: u64,
    pub files_deleted: Vec<String>,
    pub files_saved: Vec<String>,
    pub affected_record_ids: Vec<RecordId>,
    pub groups_processed: usize,
    pub groups_skipped: usize,
    pub groups_failed: usize,
    pub duration: Duration,
}

impl<'a, C, R> DedupeEngine<'a, C, R>
where
    C: Catalog + ?Sized,
    R: ReferenceRewriter + ?Sized,
{
    pub fn new(config: &AppConfig, catalog: &'a C, rewriter: &'a R) -> Self {
        Self {
            catalog,
            rewriter,
            root: config.upload_root(),
            ignore_patterns: config.ignore_patterns.clone(),
            metadata_batch_size: config.metadata_batch_size,
            inventory: None,
            checksums: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The cached inventory. `refresh` reloads it and drops the checksum index.
    pub fn records(&mut self, refresh: bool) -> Result<&Inventory, Error> {
        if refresh || self.inventory.is_none() {
            self.inventory = Some(Inventory::load(self.catalog)?);
            self.checksums = None;
        }
        Ok(self.inventory.get_or_insert_with(Inventory::default))
    }

    pub fn checksums(
        &mut self,
        refresh: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<&ChecksumIndex, Error> {
        if refresh || self.checksums.is_none() {
            self.ensure_root()?;
            let root = self.root.clone();
            let start = Instant::now();
            let index = build_checksum_index(&root, self.records(refresh)?, reporter);
            let duplicates = index.duplicate_groups().len();
            reporter.on_hash_complete(duplicates, start.elapsed().as_secs_f64());
            debug!(
                "Checksum index built in {:.2}s: {} digests, {} with duplicates",
                start.elapsed().as_secs_f64(),
                index.len(),
                duplicates,
            );
            self.checksums = Some(index);
        }
        Ok(self.checksums.get_or_insert_with(ChecksumIndex::default))
    }

    /// Content shared by two or more catalog paths, ascending by digest.
    pub fn duplicate_files(
        &mut self,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<DuplicateGroup>, Error> {
        Ok(self.checksums(false, reporter)?.duplicate_groups())
    }

    /// Paths already shared by several records, i.e. consolidated groups.
    pub fn linted_groups(&mut self, refresh: bool) -> Result<LintedGroups, Error> {
        Ok(group_records_by_path(self.records(refresh)?))
    }

    /// Records that were duplicated without duplicating the file. Same
    /// grouping as [`Self::linted_groups`], read before any file-level dedup.
    pub fn duplicate_posts(&mut self, refresh: bool) -> Result<LintedGroups, Error> {
        self.linted_groups(refresh)
    }

    pub fn sister_files(&self, canonical: &str) -> Vec<String> {
        sister_files(&self.root, canonical)
    }

    /// Files on disk no catalog record accounts for. Always reloads the
    /// inventory first.
    pub fn orphans(&mut self, include_all_subdirectories: bool) -> Result<Vec<String>, Error> {
        let root = self.root.clone();
        let ignore_patterns = self.ignore_patterns.clone();
        let inventory = self.records(true)?;
        analysis::find_orphans(&root, inventory, include_all_subdirectories, &ignore_patterns)
    }

    /// Dry run: primary selection and affected records for every duplicate
    /// group, with nothing written or deleted.
    pub fn preview(&mut self, reporter: &dyn ProgressReporter) -> Result<Vec<GroupPlan>, Error> {
        let groups = self.duplicate_files(reporter)?;
        let live = Inventory::load(self.catalog)?;
        let linted = group_records_by_path(&live);
        let official = owned_official_paths(&live);
        let mut index = live.path_index();

        Ok(groups
            .iter()
            .filter_map(|group| plan_group(&self.root, group, &linted, &official, &mut index))
            .collect())
    }

    /// Merge every duplicate group into a single primary file.
    ///
    /// Per group, ascending by digest:
    /// 1. Pick the primary, preferring a path that is already linted
    /// 2. Consume the affected records
    /// 3. Repoint them at the primary and regenerate their metadata
    /// 4. Rewrite references to, then delete, every stale variant
    /// 5. Refresh the linted snapshot if two linted groups were merged
    ///
    /// A failing group is logged and counted; the run carries on.
    pub fn consolidate(&mut self, reporter: &dyn ProgressReporter) -> Result<MergeResult, Error> {
        let start = Instant::now();
        self.ensure_root()?;
        let groups = self.duplicate_files(reporter)?;
        let mut result = MergeResult::default();
        if groups.is_empty() {
            info!("No duplicate files found");
            return Ok(result);
        }

        let live = Inventory::load(self.catalog)?;
        let mut linted = group_records_by_path(&live);
        let official = owned_official_paths(&live);
        let mut index = live.path_index();

        info!("Consolidating {} duplicate groups", groups.len());
        reporter.on_consolidate_start(groups.len());

        for (done, group) in groups.iter().enumerate() {
            let plan = plan_group(&self.root, group, &linted, &official, &mut index);
            match plan {
                None => {
                    warn!("Group {} has no catalog records left, skipping", group.digest);
                    result.groups_skipped += 1;
                }
                Some(plan) => {
                    match self.apply_plan(&plan, &mut result) {
                        Ok(()) => result.groups_processed += 1,
                        Err(e) => {
                            error!("Failed to consolidate group {}: {}", plan.digest, e);
                            result.groups_failed += 1;
                        }
                    }
                    if plan.merges_linted {
                        debug!("Linted groups merged into '{}', refreshing", plan.primary);
                        linted = group_records_by_path(&Inventory::load(self.catalog)?);
                    }
                }
            }
            reporter.on_group_complete(done + 1, groups.len());
        }

        // The catalog and the tree have both moved on.
        self.inventory = None;
        self.checksums = None;

        result.duration = start.elapsed();
        reporter.on_consolidate_complete(result.files_deleted.len(), result.duration.as_secs_f64());
        info!(
            "Consolidation complete: {} groups, {} records, {} files deleted, {} bytes saved",
            result.groups_processed,
            result.affected_record_ids.len(),
            result.files_deleted.len(),
            result.bytes_saved,
        );
        Ok(result)
    }

    /// Rebuild the persisted merged-record → primary-record rows.
    pub fn rebuild_metadata(&mut self) -> Result<usize, Error> {
        let linted = self.linted_groups(true)?;
        analysis::rebuild_merge_metadata(self.catalog, &linted, self.metadata_batch_size)
    }

    fn ensure_root(&self) -> Result<(), Error> {
        fs::read_dir(&self.root)
            .map(|_| ())
            .map_err(|_| Error::RootUnavailable(self.root.clone()))
    }

    fn apply_plan(&self, plan: &GroupPlan, result: &mut MergeResult) -> Result<(), Error> {
        if !self.root.join(&plan.primary).is_file() {
            return Err(Error::Other(format!(
                "primary file '{}' is missing",
                plan.primary
            )));
        }

        let blob = metadata::derive_metadata(&self.root, &plan.primary)?.to_blob()?;
        self.catalog
            .repoint(&plan.affected_record_ids, &plan.primary, &blob)?;

        let primary = PathParts::parse(&plan.primary);
        for stale in &plan.stale_files {
            let target = rewrite_target(&self.root, &primary, &plan.primary, stale);
            if let Err(e) = self.rewrite_references(stale, &target) {
                warn!("Keeping '{}', reference rewrite failed: {}", stale, e);
                continue;
            }
            if let Some(bytes) = delete_file(&self.root.join(stale)) {
                result.bytes_saved += bytes;
                result.files_deleted.push(stale.clone());
            }
        }

        result
            .files_saved
            .extend(sister_files(&self.root, &plan.primary));
        result
            .affected_record_ids
            .extend_from_slice(&plan.affected_record_ids);
        Ok(())
    }

    fn rewrite_references(&self, from: &str, to: &str) -> Result<(), Error> {
        if !self.rewriter.exists_anywhere(from)? {
            return Ok(());
        }
        let touched = self.rewriter.rewrite(from, to)?;
        debug!("Rewrote '{}' -> '{}' in {} rows", from, to, touched);
        Ok(())
    }
}

fn owned_official_paths(inventory: &Inventory) -> AHashSet<String> {
    inventory.iter().map(|(_, path)| path.to_string()).collect()
}

/// Steps 1 and 2 of consolidation. `None` when the group has no records left
/// to move.
pub fn plan_group(
    root: &Path,
    group: &DuplicateGroup,
    linted: &LintedGroups,
    official: &AHashSet<String>,
    index: &mut PathIndex,
) -> Option<GroupPlan> {
    let (primary, dupes, in_lint) = select_primary(&group.paths, linted)?;

    // Variants that are catalog paths in their own right belong to other
    // records and stay put.
    let mut stale_files: Vec<String> = Vec::new();
    for dupe in &dupes {
        for sister in sister_files(root, dupe) {
            let owned_elsewhere = official.contains(&sister) && !dupes.contains(&sister);
            if sister != primary && !owned_elsewhere && !stale_files.contains(&sister) {
                stale_files.push(sister);
            }
        }
    }

    let mut affected_record_ids: Vec<RecordId> = Vec::new();
    for dupe in &dupes {
        affected_record_ids.extend(index.drain(dupe));
    }
    affected_record_ids.extend(index.drain(&primary));

    if affected_record_ids.is_empty() {
        return None;
    }

    Some(GroupPlan {
        digest: group.digest,
        primary,
        dupes,
        stale_files,
        affected_record_ids,
        merges_linted: in_lint > 1,
    })
}

/// The first linted path is the primary; without one, the first path. Also
/// returns how many of the group's paths were linted.
pub fn select_primary(
    paths: &[String],
    linted: &LintedGroups,
) -> Option<(String, Vec<String>, usize)> {
    let mut primary: Option<String> = None;
    let mut dupes: Vec<String> = Vec::new();
    let mut in_lint = 0;

    for path in paths {
        let is_linted = linted.contains_key(path);
        if is_linted {
            in_lint += 1;
        }
        if primary.is_none() && is_linted {
            primary = Some(path.clone());
        } else {
            dupes.push(path.clone());
        }
    }

    let primary = match primary {
        Some(primary) => primary,
        None if dupes.is_empty() => return None,
        None => dupes.remove(0),
    };
    Some((primary, dupes, in_lint))
}

/// Where references to `stale` should point: the primary's variant of the
/// same size when it exists on disk, the primary itself otherwise.
pub fn rewrite_target(root: &Path, primary: &PathParts<'_>, primary_path: &str, stale: &str) -> String {
    let size = PathParts::parse(stale).size_suffix().unwrap_or("");
    let candidate = primary.sibling(&format!("{}{}.{}", primary.stem, size, primary.extension));
    if root.join(&candidate).is_file() {
        candidate
    } else {
        primary_path.to_string()
    }
}

/// Remove a file, returning the size it had. `None` if it was already gone or
/// could not be removed.
fn delete_file(path: &Path) -> Option<u64> {
    let size = fs::metadata(path).ok().filter(|m| m.is_file())?.len();
    match fs::remove_file(path) {
        Ok(()) => Some(size),
        Err(e) => {
            warn!("Failed to remove '{}': {}", path.display(), e);
            None
        }
    }
}
