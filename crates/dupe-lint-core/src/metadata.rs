use crate::analysis::sister_files;
use crate::error::Error;
use crate::path_parts::{parse_dimensions, PathParts};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A `-WIDTHxHEIGHT` rendition sitting next to the source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub file: String,
    pub width: u32,
    pub height: u32,
}

/// Per-record sidecar data, regenerated from the file a record points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetadata {
    pub file: String,
    pub file_size: u64,
    pub format: String,
    pub sizes: Vec<SizeVariant>,
}

impl DerivedMetadata {
    pub fn to_blob(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_blob(blob: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(blob)?)
    }
}

pub fn derive_metadata(root: &Path, relative: &str) -> Result<DerivedMetadata, Error> {
    let file_size = fs::metadata(root.join(relative))?.len();
    let parts = PathParts::parse(relative);

    let sizes = sister_files(root, relative)
        .iter()
        .filter_map(|sister| {
            let sister_parts = PathParts::parse(sister);
            let (width, height) = parse_dimensions(sister_parts.size_suffix()?)?;
            Some(SizeVariant {
                file: sister_parts.file_name.to_string(),
                width,
                height,
            })
        })
        .collect();

    Ok(DerivedMetadata {
        file: relative.to_string(),
        file_size,
        format: parts.extension.to_ascii_lowercase(),
        sizes,
    })
}
