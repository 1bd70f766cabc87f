use crate::error::Error;
use crate::path_parts::relative_to;
use glob::Pattern;
use std::fs;
use std::path::Path;
use tracing::{error, warn};
use walkdir::WalkDir;

/// Recursive listing of every regular file under `root`, as sorted
/// `/`-separated relative paths. Symlinks are not followed.
///
/// An inaccessible root is fatal; unreadable entries further down are logged
/// and skipped. Ignore globs match either the absolute or the relative path.
pub fn list_files(root: &Path, ignore_globs: &[String]) -> Result<Vec<String>, Error> {
    if fs::read_dir(root).is_err() {
        return Err(Error::RootUnavailable(root.to_path_buf()));
    }

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let is_ignored = |path: &Path| {
        let relative = relative_to(root, path);
        ignore_patterns.iter().any(|pattern| {
            pattern.matches_path(path)
                || relative
                    .as_deref()
                    .map_or(false, |relative| pattern.matches(relative))
        })
    };

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Error walking upload directory: {}", err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match relative_to(root, entry.path()) {
            Some(relative) => files.push(relative),
            None => warn!("Skipping non UTF-8 path {}", entry.path().display()),
        }
    }

    files.sort();
    Ok(files)
}
