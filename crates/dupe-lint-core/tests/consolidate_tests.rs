use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use dupe_lint_core::analysis::MERGE_META_KEY;
use dupe_lint_core::metadata::DerivedMetadata;
use dupe_lint_core::storage::{Database, SqliteRewriter};
use dupe_lint_core::{
    AppConfig, Catalog, DedupeEngine, Error, MetadataRow, Record, RecordId, SilentReporter,
};

fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup(records: &[(i64, &str)]) -> (TempDir, AppConfig, Database) {
    let tmp = tempdir().unwrap();
    let config = AppConfig::new(tmp.path().to_string_lossy().into_owned());
    let db = Database::open_in_memory().unwrap();
    let records: Vec<Record> = records.iter().map(|(id, p)| Record::new(*id, *p)).collect();
    db.insert_records(&records).unwrap();
    (tmp, config, db)
}

fn record_path(db: &Database, id: i64) -> String {
    db.get_record(id).unwrap().unwrap().path
}

/// Layout:
///   2024/01/a.jpg          (1 KiB of 0xAB)   record 1
///   2024/01/a-150x150.jpg  (thumbnail of a)
///   2024/02/b.jpg          (1 KiB of 0xAB)   record 2  ← duplicate of a.jpg
///   2024/02/b-150x150.jpg  (thumbnail of b)
fn two_uploads_of_one_image() -> (TempDir, AppConfig, Database) {
    let (tmp, config, db) = setup(&[(1, "2024/01/a.jpg"), (2, "2024/02/b.jpg")]);
    let content = vec![0xABu8; 1024];
    write_file(tmp.path(), "2024/01/a.jpg", &content);
    write_file(tmp.path(), "2024/01/a-150x150.jpg", b"thumb a");
    write_file(tmp.path(), "2024/02/b.jpg", &content);
    write_file(tmp.path(), "2024/02/b-150x150.jpg", b"thumb b!");
    (tmp, config, db)
}

#[test]
fn test_duplicate_files_groups_identical_content() {
    let (tmp, config, db) = two_uploads_of_one_image();
    write_file(tmp.path(), "2024/03/unique.jpg", b"something else");
    db.insert_records(&[Record::new(3, "2024/03/unique.jpg")]).unwrap();

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    let groups = engine.duplicate_files(&SilentReporter).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec!["2024/01/a.jpg", "2024/02/b.jpg"]);
    assert_eq!(groups[0].redundant_count(), 1);
}

#[test]
fn test_consolidate_merges_group_into_first_path() {
    let (tmp, config, db) = two_uploads_of_one_image();
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);

    let result = engine.consolidate(&SilentReporter).unwrap();

    assert_eq!(result.groups_processed, 1);
    assert_eq!(result.groups_failed, 0);
    assert_eq!(result.affected_record_ids, vec![2, 1]);
    assert_eq!(record_path(&db, 1), "2024/01/a.jpg");
    assert_eq!(record_path(&db, 2), "2024/01/a.jpg");

    assert_eq!(
        result.files_deleted,
        vec!["2024/02/b-150x150.jpg", "2024/02/b.jpg"]
    );
    assert_eq!(
        result.files_saved,
        vec!["2024/01/a-150x150.jpg", "2024/01/a.jpg"]
    );
    assert!(!tmp.path().join("2024/02/b.jpg").exists());
    assert!(!tmp.path().join("2024/02/b-150x150.jpg").exists());
    assert!(tmp.path().join("2024/01/a.jpg").exists());
    assert!(tmp.path().join("2024/01/a-150x150.jpg").exists());
}

#[test]
fn test_bytes_saved_counts_deleted_files() {
    let (tmp, config, db) = setup(&[(1, "2024/01/a.bin"), (2, "2024/02/b.bin")]);
    write_file(tmp.path(), "2024/01/a.bin", &[7u8; 1024]);
    write_file(tmp.path(), "2024/02/b.bin", &[7u8; 1024]);

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    let result = engine.consolidate(&SilentReporter).unwrap();

    assert_eq!(result.bytes_saved, 1024);
    assert_eq!(result.files_deleted, vec!["2024/02/b.bin"]);
}

#[test]
fn test_consolidate_is_idempotent() {
    let (_tmp, config, db) = two_uploads_of_one_image();
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);

    engine.consolidate(&SilentReporter).unwrap();
    let second = engine.consolidate(&SilentReporter).unwrap();

    assert_eq!(second.groups_processed, 0);
    assert!(second.affected_record_ids.is_empty());
    assert_eq!(second.bytes_saved, 0);
    assert!(second.files_deleted.is_empty());
    assert!(engine.duplicate_files(&SilentReporter).unwrap().is_empty());
}

#[test]
fn test_references_follow_matching_size() {
    let (_tmp, config, db) = two_uploads_of_one_image();
    let post = db
        .insert_content(
            "Post",
            "<img src=\"/uploads/2024/02/b-150x150.jpg\"> <a href=\"/uploads/2024/02/b.jpg\">",
        )
        .unwrap();

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    engine.consolidate(&SilentReporter).unwrap();

    let body = db.get_content(post).unwrap().unwrap().body;
    assert_eq!(
        body,
        "<img src=\"/uploads/2024/01/a-150x150.jpg\"> <a href=\"/uploads/2024/01/a.jpg\">"
    );
}

#[test]
fn test_consolidate_regenerates_derived_metadata() {
    let (_tmp, config, db) = two_uploads_of_one_image();
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    engine.consolidate(&SilentReporter).unwrap();

    for id in [1, 2] {
        let blob = db.get_record(id).unwrap().unwrap().derived_metadata.unwrap();
        let meta = DerivedMetadata::from_blob(&blob).unwrap();
        assert_eq!(meta.file, "2024/01/a.jpg");
        assert_eq!(meta.file_size, 1024);
        assert_eq!(meta.format, "jpg");
        assert_eq!(meta.sizes.len(), 1);
        assert_eq!(meta.sizes[0].file, "a-150x150.jpg");
        assert_eq!((meta.sizes[0].width, meta.sizes[0].height), (150, 150));
    }
}

#[test]
fn test_linted_path_stays_primary() {
    let (tmp, config, db) = setup(&[
        (1, "2024/01/a.png"),
        (2, "2024/02/b.png"),
        (3, "2024/02/b.png"),
    ]);
    write_file(tmp.path(), "2024/01/a.png", b"same pixels");
    write_file(tmp.path(), "2024/02/b.png", b"same pixels");

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    let result = engine.consolidate(&SilentReporter).unwrap();

    assert_eq!(result.affected_record_ids, vec![1, 2, 3]);
    for id in 1..=3 {
        assert_eq!(record_path(&db, id), "2024/02/b.png");
    }
    assert!(!tmp.path().join("2024/01/a.png").exists());
    assert!(tmp.path().join("2024/02/b.png").exists());
}

#[test]
fn test_two_linted_groups_merge_into_one() {
    let (tmp, config, db) = setup(&[
        (1, "2024/01/x.gif"),
        (2, "2024/01/x.gif"),
        (3, "2024/02/y.gif"),
        (4, "2024/02/y.gif"),
    ]);
    write_file(tmp.path(), "2024/01/x.gif", b"GIF89a");
    write_file(tmp.path(), "2024/02/y.gif", b"GIF89a");

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    assert_eq!(engine.linted_groups(true).unwrap().len(), 2);

    engine.consolidate(&SilentReporter).unwrap();

    let linted = engine.linted_groups(true).unwrap();
    assert_eq!(linted.len(), 1);
    assert_eq!(linted["2024/01/x.gif"], vec![1, 2, 3, 4]);

    assert_eq!(engine.rebuild_metadata().unwrap(), 3);
    let rows = db.get_metadata(MERGE_META_KEY).unwrap();
    let members: Vec<(i64, &str)> = rows
        .iter()
        .map(|r| (r.record_id, r.value.as_str()))
        .collect();
    assert_eq!(members, vec![(2, "1"), (3, "1"), (4, "1")]);
}

#[test]
fn test_variant_owned_by_another_record_is_kept() {
    let (tmp, config, db) = two_uploads_of_one_image();
    db.insert_records(&[Record::new(3, "2024/02/b-150x150.jpg")])
        .unwrap();

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    let result = engine.consolidate(&SilentReporter).unwrap();

    assert_eq!(result.files_deleted, vec!["2024/02/b.jpg"]);
    assert!(tmp.path().join("2024/02/b-150x150.jpg").exists());
    assert_eq!(record_path(&db, 3), "2024/02/b-150x150.jpg");
}

#[test]
fn test_preview_changes_nothing() {
    let (tmp, config, db) = two_uploads_of_one_image();
    let post = db.insert_content("Post", "2024/02/b.jpg").unwrap();

    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    let plans = engine.preview(&SilentReporter).unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].primary, "2024/01/a.jpg");
    assert_eq!(plans[0].dupes, vec!["2024/02/b.jpg"]);
    assert_eq!(plans[0].affected_record_ids, vec![2, 1]);
    assert_eq!(plans[0].metadata_source(), Some(1));
    assert!(!plans[0].merges_linted);

    assert_eq!(record_path(&db, 2), "2024/02/b.jpg");
    assert_eq!(db.get_content(post).unwrap().unwrap().body, "2024/02/b.jpg");
    assert!(tmp.path().join("2024/02/b.jpg").exists());
    assert!(tmp.path().join("2024/02/b-150x150.jpg").exists());

    // A preview leaves the real run's outcome unchanged.
    let result = engine.consolidate(&SilentReporter).unwrap();
    assert_eq!(result.affected_record_ids, plans[0].affected_record_ids);
}

#[test]
fn test_missing_primary_fails_group_without_mutation() {
    let (tmp, config, db) = two_uploads_of_one_image();
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);

    assert_eq!(engine.duplicate_files(&SilentReporter).unwrap().len(), 1);
    fs::remove_file(tmp.path().join("2024/01/a.jpg")).unwrap();

    let result = engine.consolidate(&SilentReporter).unwrap();
    assert_eq!(result.groups_failed, 1);
    assert_eq!(result.groups_processed, 0);
    assert_eq!(record_path(&db, 2), "2024/02/b.jpg");
    assert!(tmp.path().join("2024/02/b.jpg").exists());
}

#[test]
fn test_group_without_records_is_skipped() {
    let (tmp, config, db) = two_uploads_of_one_image();
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);

    assert_eq!(engine.duplicate_files(&SilentReporter).unwrap().len(), 1);
    db.connection().execute("DELETE FROM record", []).unwrap();

    let result = engine.consolidate(&SilentReporter).unwrap();
    assert_eq!(result.groups_skipped, 1);
    assert_eq!(result.bytes_saved, 0);
    assert!(tmp.path().join("2024/02/b.jpg").exists());
}

#[test]
fn test_unavailable_root_is_fatal() {
    let db = Database::open_in_memory().unwrap();
    let config = AppConfig::new("/definitely/not/an/upload/dir");
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);

    assert!(matches!(
        engine.consolidate(&SilentReporter),
        Err(dupe_lint_core::Error::RootUnavailable(_))
    ));
}

/// Catalog whose record `vanishing` is deleted by another writer just before
/// the group is repointed.
struct VanishingCatalog<'a> {
    db: &'a Database,
    vanishing: RecordId,
}

impl Catalog for VanishingCatalog<'_> {
    fn list_records(&self) -> Result<Vec<Record>, Error> {
        self.db.list_records()
    }

    fn update_path(&self, ids: &[RecordId], new_path: &str) -> Result<usize, Error> {
        self.db.update_path(ids, new_path)
    }

    fn update_derived_metadata(&self, id: RecordId, blob: &str) -> Result<(), Error> {
        self.db.update_derived_metadata(id, blob)
    }

    fn repoint(&self, ids: &[RecordId], new_path: &str, blob: &str) -> Result<usize, Error> {
        self.db
            .connection()
            .execute("DELETE FROM record WHERE id = ?1", [self.vanishing])
            .unwrap();
        self.db.repoint(ids, new_path, blob)
    }

    fn delete_metadata(&self, key: &str) -> Result<usize, Error> {
        self.db.delete_metadata(key)
    }

    fn insert_metadata(&self, rows: &[MetadataRow]) -> Result<usize, Error> {
        self.db.insert_metadata(rows)
    }
}

#[test]
fn test_vanished_record_leaves_group_untouched() {
    let (tmp, config, db) = two_uploads_of_one_image();
    db.insert_records(&[Record::new(3, "2024/01/a.jpg")]).unwrap();

    let racy = VanishingCatalog {
        db: &db,
        vanishing: 3,
    };
    let rewriter = SqliteRewriter::new(&db);
    let mut engine = DedupeEngine::new(&config, &racy, &rewriter);
    let result = engine.consolidate(&SilentReporter).unwrap();

    assert_eq!(result.groups_failed, 1);
    assert_eq!(result.groups_processed, 0);
    assert_eq!(record_path(&db, 2), "2024/02/b.jpg");
    assert!(db.get_record(2).unwrap().unwrap().derived_metadata.is_none());
    assert!(tmp.path().join("2024/02/b.jpg").exists());

    // The group is still whole, so the next run picks it up.
    let mut engine = DedupeEngine::new(&config, &db, &rewriter);
    let retry = engine.consolidate(&SilentReporter).unwrap();
    assert_eq!(retry.groups_processed, 1);
    assert_eq!(record_path(&db, 2), "2024/01/a.jpg");
    assert_eq!(retry.files_deleted, vec!["2024/02/b-150x150.jpg", "2024/02/b.jpg"]);
    assert!(engine.orphans(false).unwrap().is_empty());
}
