use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dupe-lint")]
#[command(about = "Find and consolidate duplicate media uploads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List catalog files whose content is duplicated
    List {
        /// Also list paths already shared by several records
        #[arg(long)]
        linted: bool,
    },
    /// List records that point at the same file
    DuplicatePosts,
    /// List files on disk that no record accounts for
    Orphans {
        /// Look outside the root and YYYY/MM directories too
        #[arg(long)]
        all: bool,
    },
    /// Merge every duplicate group into a single file
    Deduplicate {
        /// Show what would change without touching anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Rebuild the merged-record metadata from the catalog
    RegenerateMetadata,
    /// Show whether a record was merged, and into which record
    ShowRecord {
        id: i64,
    },
    /// Print configuration values
    PrintConfig,
}
