pub mod linted;
pub mod orphans;
pub mod reconcile;
pub mod sister_files;

pub use linted::{group_records_by_path, LintedGroups};
pub use orphans::{find_orphans, Verdict};
pub use reconcile::{rebuild_merge_metadata, MERGE_META_KEY};
pub use sister_files::{raster_sister, sister_files};
