use crate::path_parts::{size_suffix, PathParts};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Extensions a WebP copy is usually converted from.
pub const BASE_RASTER_EXTENSIONS: [&str; 4] = ["gif", "jpg", "jpeg", "png"];

/// Every file next to `canonical` named `{stem}(-WxH)?.{ext}`, including
/// `canonical` itself when present. Single directory level only; the
/// extension must match exactly.
pub fn sister_files(root: &Path, canonical: &str) -> Vec<String> {
    let parts = PathParts::parse(canonical);
    if parts.stem.is_empty() || parts.extension.is_empty() {
        return Vec::new();
    }

    let dir = root.join(parts.parent_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No sister files for '{}': {}", canonical, e);
            return Vec::new();
        }
    };

    let mut out: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| is_sister_name(name, parts.stem, parts.extension))
        .map(|name| parts.sibling(&name))
        .collect();
    out.sort();
    out
}

pub fn is_sister_name(name: &str, stem: &str, extension: &str) -> bool {
    let Some(candidate) = name
        .strip_suffix(extension)
        .and_then(|n| n.strip_suffix('.'))
    else {
        return false;
    };
    match candidate.strip_prefix(stem) {
        Some("") => true,
        Some(rest) => size_suffix(rest) == Some(rest),
        None => false,
    }
}

/// For an existing `.webp` file, the same-stem file in one of the
/// [`BASE_RASTER_EXTENSIONS`], if one exists on disk.
pub fn raster_sister(root: &Path, webp: &str) -> Option<String> {
    let parts = PathParts::parse(webp);
    if !parts.extension.eq_ignore_ascii_case("webp") || !root.join(webp).is_file() {
        return None;
    }

    BASE_RASTER_EXTENSIONS
        .iter()
        .map(|ext| parts.sibling(&format!("{}.{}", parts.stem, ext)))
        .find(|candidate| root.join(candidate).exists())
}
