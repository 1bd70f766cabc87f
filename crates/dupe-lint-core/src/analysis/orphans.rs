//! Orphan classification.
//!
//! Every file on disk that the catalog doesn't reference directly is run
//! through an ordered list of rules. The first rule with an opinion decides;
//! a file no rule can explain is an orphan. Each rule only ever answers
//! "keep" when it can positively explain where a file came from, except the
//! WebP rule which is decisive both ways.

use super::sister_files::raster_sister;
use crate::error::Error;
use crate::inventory::Inventory;
use crate::path_parts::{size_suffix, PathParts};
use crate::scanner;
use ahash::AHashSet;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

lazy_static! {
    static ref NON_CONTENT: Regex = Regex::new(r"(?i)\.(html?|php|js|css)(\.(gz|br))?$").unwrap();
    static ref DATE_BUCKET: Regex = Regex::new(r"^[0-9]{4}/[0-9]{2}$").unwrap();
    static ref PDF_PREVIEW: Regex = Regex::new(r"-pdf(-[0-9]+x[0-9]+)?$").unwrap();
    static ref EDITOR_THUMBNAIL: Regex = Regex::new(r"-[0-9]+x[0-9]+-[0-9]{10,}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    NonContent,
    Official,
    OutsideUploadLayout,
    RasterSister,
    SizedThumbnail,
    PdfPreview,
    EditorThumbnail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep(KeepReason),
    Orphan,
}

/// A file found on disk, relative to the upload root.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub relative: &'a str,
    pub parts: PathParts<'a>,
}

impl<'a> Candidate<'a> {
    pub fn new(relative: &'a str) -> Self {
        Candidate {
            relative,
            parts: PathParts::parse(relative),
        }
    }

    /// The stem with `suffix` (which it must end with) cut off.
    fn stem_without(&self, suffix: &str) -> &'a str {
        &self.parts.stem[..self.parts.stem.len() - suffix.len()]
    }
}

pub struct KnownFiles<'a> {
    root: &'a Path,
    official: AHashSet<&'a str>,
    include_all_subdirectories: bool,
}

impl<'a> KnownFiles<'a> {
    pub fn new(root: &'a Path, inventory: &'a Inventory, include_all_subdirectories: bool) -> Self {
        Self {
            root,
            official: inventory.official_paths(),
            include_all_subdirectories,
        }
    }

    pub fn is_official(&self, relative: &str) -> bool {
        self.official.contains(relative)
    }
}

pub type Rule = fn(&Candidate<'_>, &KnownFiles<'_>) -> Option<Verdict>;

/// Evaluated in order, first answer wins.
pub const RULES: [Rule; 7] = [
    non_content,
    official,
    outside_upload_layout,
    webp_copy,
    sized_thumbnail,
    pdf_preview,
    editor_thumbnail,
];

pub fn classify(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Verdict {
    RULES
        .iter()
        .find_map(|rule| rule(candidate, known))
        .unwrap_or(Verdict::Orphan)
}

pub fn non_content(candidate: &Candidate<'_>, _known: &KnownFiles<'_>) -> Option<Verdict> {
    NON_CONTENT
        .is_match(candidate.relative)
        .then_some(Verdict::Keep(KeepReason::NonContent))
}

pub fn official(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Option<Verdict> {
    known
        .is_official(candidate.relative)
        .then_some(Verdict::Keep(KeepReason::Official))
}

/// Outside the root and `YYYY/MM` buckets lives someone else's data.
pub fn outside_upload_layout(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Option<Verdict> {
    let dir = candidate.parts.parent_dir;
    let in_layout = dir.is_empty() || DATE_BUCKET.is_match(dir);
    (!known.include_all_subdirectories && !in_layout)
        .then_some(Verdict::Keep(KeepReason::OutsideUploadLayout))
}

pub fn webp_copy(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Option<Verdict> {
    if !candidate.parts.extension.eq_ignore_ascii_case("webp") {
        return None;
    }
    match raster_sister(known.root, candidate.relative) {
        Some(_) => Some(Verdict::Keep(KeepReason::RasterSister)),
        None => Some(Verdict::Orphan),
    }
}

/// `photo-150x150.jpg` next to an official `photo.jpg`.
pub fn sized_thumbnail(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Option<Verdict> {
    let suffix = size_suffix(candidate.parts.stem)?;
    let original = format!("{}.{}", candidate.stem_without(suffix), candidate.parts.extension);
    known
        .is_official(&candidate.parts.sibling(&original))
        .then_some(Verdict::Keep(KeepReason::SizedThumbnail))
}

/// `manual-pdf.jpg` or `manual-pdf-116x150.jpg` next to an official `manual.pdf`.
pub fn pdf_preview(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Option<Verdict> {
    let suffix = PDF_PREVIEW.find(candidate.parts.stem)?.as_str();
    let original = format!("{}.pdf", candidate.stem_without(suffix));
    known
        .is_official(&candidate.parts.sibling(&original))
        .then_some(Verdict::Keep(KeepReason::PdfPreview))
}

/// `photo-300x200-1617034567890.jpg`. Image editors build these either from the
/// full file name (`photo.jpg-300x200-…`) or from the stem, so both
/// reconstructions have to be checked.
pub fn editor_thumbnail(candidate: &Candidate<'_>, known: &KnownFiles<'_>) -> Option<Verdict> {
    let suffix = EDITOR_THUMBNAIL.find(candidate.parts.stem)?.as_str();
    let stripped = candidate.stem_without(suffix);
    let as_is = candidate.parts.sibling(stripped);
    let with_ext = candidate
        .parts
        .sibling(&format!("{}.{}", stripped, candidate.parts.extension));
    (known.is_official(&as_is) || known.is_official(&with_ext))
        .then_some(Verdict::Keep(KeepReason::EditorThumbnail))
}

/// Walk the upload tree and return every file no rule can explain, sorted.
pub fn find_orphans(
    root: &Path,
    inventory: &Inventory,
    include_all_subdirectories: bool,
    ignore_globs: &[String],
) -> Result<Vec<String>, Error> {
    let files = scanner::list_files(root, ignore_globs)?;
    let known = KnownFiles::new(root, inventory, include_all_subdirectories);

    let orphans: Vec<String> = files
        .into_iter()
        .filter(|relative| {
            let verdict = classify(&Candidate::new(relative), &known);
            debug!("{}: {:?}", relative, verdict);
            verdict == Verdict::Orphan
        })
        .collect();

    info!("{} orphaned files found", orphans.len());
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Record;

    fn inventory(paths: &[&str]) -> Inventory {
        Inventory::from_records(
            paths
                .iter()
                .enumerate()
                .map(|(i, p)| Record::new(i as i64 + 1, *p)),
        )
    }

    fn verdict(relative: &str, official: &[&str], all: bool) -> Verdict {
        let inventory = inventory(official);
        let known = KnownFiles::new(Path::new("/nonexistent"), &inventory, all);
        classify(&Candidate::new(relative), &known)
    }

    #[test]
    fn test_non_content_is_kept() {
        assert_eq!(
            verdict("2024/05/index.php", &[], false),
            Verdict::Keep(KeepReason::NonContent)
        );
        assert_eq!(
            verdict("style.CSS.gz", &[], false),
            Verdict::Keep(KeepReason::NonContent)
        );
        assert_eq!(verdict("2024/05/page.htm.br.jpg", &[], false), Verdict::Orphan);
    }

    #[test]
    fn test_official_is_kept() {
        assert_eq!(
            verdict("2024/05/a.jpg", &["2024/05/a.jpg"], false),
            Verdict::Keep(KeepReason::Official)
        );
    }

    #[test]
    fn test_upload_layout() {
        assert_eq!(
            verdict("cache/thing.jpg", &[], false),
            Verdict::Keep(KeepReason::OutsideUploadLayout)
        );
        assert_eq!(
            verdict("2024/5/thing.jpg", &[], false),
            Verdict::Keep(KeepReason::OutsideUploadLayout)
        );
        assert_eq!(
            verdict("２０２４/０５/thing.jpg", &[], false),
            Verdict::Keep(KeepReason::OutsideUploadLayout)
        );
        assert_eq!(verdict("cache/thing.jpg", &[], true), Verdict::Orphan);
        assert_eq!(verdict("thing.jpg", &[], false), Verdict::Orphan);
    }

    #[test]
    fn test_sized_thumbnail() {
        let official = ["2024/05/photo.jpg"];
        assert_eq!(
            verdict("2024/05/photo-150x150.jpg", &official, false),
            Verdict::Keep(KeepReason::SizedThumbnail)
        );
        assert_eq!(verdict("2024/05/photo-150x150.png", &official, false), Verdict::Orphan);
        assert_eq!(verdict("2024/06/photo-150x150.jpg", &official, false), Verdict::Orphan);
    }

    #[test]
    fn test_pdf_preview() {
        let official = ["2023/01/manual.pdf"];
        assert_eq!(
            verdict("2023/01/manual-pdf.jpg", &official, false),
            Verdict::Keep(KeepReason::PdfPreview)
        );
        assert_eq!(
            verdict("2023/01/manual-pdf-116x150.jpg", &official, false),
            Verdict::Keep(KeepReason::PdfPreview)
        );
        assert_eq!(verdict("2023/01/other-pdf.jpg", &official, false), Verdict::Orphan);
    }

    #[test]
    fn test_editor_thumbnail_both_conventions() {
        assert_eq!(
            verdict("2022/08/pic.jpg-300x200-1617034567890.jpg", &["2022/08/pic.jpg"], false),
            Verdict::Keep(KeepReason::EditorThumbnail)
        );
        assert_eq!(
            verdict("2022/08/pic-300x200-1617034567890.jpg", &["2022/08/pic.jpg"], false),
            Verdict::Keep(KeepReason::EditorThumbnail)
        );
        assert_eq!(
            verdict("2022/08/pic-300x200-123.jpg", &["2022/08/pic.jpg"], false),
            Verdict::Orphan
        );
    }

    #[test]
    fn test_webp_without_sister_is_orphan_even_if_named_like_thumbnail() {
        assert_eq!(
            verdict("2024/05/photo-150x150.webp", &["2024/05/photo.webp"], false),
            Verdict::Orphan
        );
    }
}
