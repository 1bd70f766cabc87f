pub mod analysis;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod inventory;
pub mod metadata;
pub mod path_parts;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use catalog::{Catalog, MetadataRow, Record, RecordId, ReferenceRewriter};
pub use config::AppConfig;
pub use engine::{DedupeEngine, GroupPlan, MergeResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
