use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = "dupe_lint.db";
pub const DEFAULT_METADATA_BATCH_SIZE: usize = 250;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root of the file tree the catalog paths are relative to.
    pub upload_dir: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Glob patterns excluded from the orphan walk.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub include_all_subdirectories: bool,
    #[serde(default = "default_metadata_batch_size")]
    pub metadata_batch_size: usize,
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_metadata_batch_size() -> usize {
    DEFAULT_METADATA_BATCH_SIZE
}

impl AppConfig {
    pub fn new(upload_dir: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            db_path: default_db_path(),
            ignore_patterns: Vec::new(),
            include_all_subdirectories: false,
            metadata_batch_size: DEFAULT_METADATA_BATCH_SIZE,
        }
    }

    pub fn upload_root(&self) -> PathBuf {
        Path::new(&self.upload_dir).to_path_buf()
    }
}

/// Layered configuration: optional `Config.toml` in the working directory,
/// then `DUPE_LINT_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .set_default("upload_dir", ".")?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("DUPE_LINT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
