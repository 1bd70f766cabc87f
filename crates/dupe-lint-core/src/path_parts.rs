use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path};

lazy_static! {
    static ref SIZE_SUFFIX: Regex = Regex::new(r"-[0-9]+x[0-9]+$").unwrap();
}

/// Pieces of a `/`-separated path relative to the upload root.
///
/// `stem` is everything before the last dot of the file name and `extension`
/// everything after it, so `photo.tar.gz` splits as `photo.tar` / `gz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParts<'a> {
    pub parent_dir: &'a str,
    pub file_name: &'a str,
    pub stem: &'a str,
    pub extension: &'a str,
}

impl<'a> PathParts<'a> {
    pub fn parse(relative: &'a str) -> Self {
        let (parent_dir, file_name) = relative.rsplit_once('/').unwrap_or(("", relative));
        let (stem, extension) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
        PathParts {
            parent_dir,
            file_name,
            stem,
            extension,
        }
    }

    /// `name` placed in the same directory.
    pub fn sibling(&self, name: &str) -> String {
        join_relative(self.parent_dir, name)
    }

    /// The trailing `-WIDTHxHEIGHT` of the stem, if any.
    pub fn size_suffix(&self) -> Option<&'a str> {
        size_suffix(self.stem)
    }
}

pub fn size_suffix(stem: &str) -> Option<&str> {
    SIZE_SUFFIX.find(stem).map(|m| m.as_str())
}

/// Parse a `-WIDTHxHEIGHT` suffix into its dimensions.
pub fn parse_dimensions(suffix: &str) -> Option<(u32, u32)> {
    let (width, height) = suffix.strip_prefix('-')?.split_once('x')?;
    Some((width.parse().ok()?, height.parse().ok()?))
}

pub fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// `path` relative to `root`, `/`-separated. `None` when `path` is not under
/// `root` or is not valid UTF-8.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;
    let mut parts: Vec<&str> = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
