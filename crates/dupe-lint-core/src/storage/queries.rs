use super::models::*;
use super::sqlite::Database;
use crate::analysis::MERGE_META_KEY;
use crate::catalog::{Catalog, MetadataRow, Record, RecordId};
use crate::error::Error;
use rusqlite::{params, OptionalExtension, Result};
use std::collections::BTreeSet;
use tracing::debug;

impl Database {
    // ── Records ──────────────────────────────────────────────────

    pub fn insert_records(&self, records: &[Record]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO record (id, path) VALUES (?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET path = excluded.path",
            )?;
            for record in records {
                count += stmt.execute(params![record.id, record.path])?;
            }
        }
        tx.commit()?;
        debug!("Upserted {} records", count);
        Ok(count)
    }

    pub fn get_records(&self) -> Result<Vec<Record>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, path FROM record ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    path: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_record(&self, id: RecordId) -> Result<Option<StoredRecord>> {
        self.connection()
            .query_row(
                "SELECT id, path, derived_metadata FROM record WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredRecord {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        derived_metadata: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn set_record_paths(&self, ids: &[RecordId], new_path: &str) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached("UPDATE record SET path = ?1 WHERE id = ?2")?;
            for id in ids {
                count += stmt.execute(params![new_path, id])?;
            }
        }
        tx.commit()?;
        debug!("Repointed {} records to '{}'", count, new_path);
        Ok(count)
    }

    // ── Record Metadata ──────────────────────────────────────────

    pub fn insert_metadata_rows(&self, rows: &[MetadataRow]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO record_meta (record_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
            )?;
            for row in rows {
                count += stmt.execute(params![row.record_id, row.key, row.value])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn delete_metadata_key(&self, key: &str) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM record_meta WHERE meta_key = ?1", params![key])
    }

    pub fn get_metadata(&self, key: &str) -> Result<Vec<MetadataRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT record_id, meta_key, meta_value FROM record_meta \
             WHERE meta_key = ?1 ORDER BY record_id ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![key], |row| {
                Ok(MetadataRow {
                    record_id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Merge Lookups ────────────────────────────────────────────

    /// The primary record a merged record defers to. A primary maps to
    /// itself; a record outside any merged group maps to `None`.
    pub fn merge_primary_of(&self, id: RecordId) -> Result<Option<RecordId>> {
        let as_member: Option<String> = self
            .connection()
            .query_row(
                "SELECT meta_value FROM record_meta WHERE meta_key = ?1 AND record_id = ?2 \
                 ORDER BY id ASC LIMIT 1",
                params![MERGE_META_KEY, id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(primary) = as_member.and_then(|v| v.parse::<RecordId>().ok()) {
            return Ok(Some(primary));
        }

        let is_primary: bool = self.connection().query_row(
            "SELECT EXISTS(SELECT 1 FROM record_meta WHERE meta_key = ?1 AND meta_value = ?2)",
            params![MERGE_META_KEY, id.to_string()],
            |row| row.get(0),
        )?;
        Ok(is_primary.then_some(id))
    }

    /// Every record taking part in a merged group, primaries included.
    pub fn deduplicated_record_ids(&self) -> Result<BTreeSet<RecordId>> {
        let rows = self.get_metadata(MERGE_META_KEY)?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row.record_id);
            if let Ok(primary) = row.value.parse::<RecordId>() {
                ids.insert(primary);
            }
        }
        Ok(ids)
    }

    // ── Content ──────────────────────────────────────────────────

    pub fn insert_content(&self, title: &str, body: &str) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO content (title, body) VALUES (?1, ?2)",
            params![title, body],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn get_content(&self, id: i64) -> Result<Option<ContentRow>> {
        self.connection()
            .query_row(
                "SELECT id, title, body FROM content WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ContentRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        body: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    // ── Schema Introspection ─────────────────────────────────────

    /// Text-typed columns of every user table, tables mentioning `content`
    /// first. The `record` table is left out: its paths belong to the
    /// catalog and are repointed separately.
    pub fn text_columns(&self) -> Result<Vec<TextColumns>> {
        let mut stmt = self.connection().prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name <> 'record' \
             ORDER BY (name LIKE '%content%') DESC, name ASC",
        )?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::new();
        for table in tables {
            let mut info = self
                .connection()
                .prepare(&format!("PRAGMA table_info({})", quote_ident(&table)))?;
            let columns: Vec<String> = info
                .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|(_, decl)| is_text_type(decl))
                .map(|(name, _)| name)
                .collect();
            if !columns.is_empty() {
                out.push(TextColumns { table, columns });
            }
        }
        Ok(out)
    }
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn is_text_type(decl: &str) -> bool {
    let decl = decl.to_ascii_uppercase();
    decl.contains("CHAR") || decl.contains("TEXT") || decl.contains("CLOB")
}

impl Catalog for Database {
    fn list_records(&self) -> std::result::Result<Vec<Record>, Error> {
        Ok(self.get_records()?)
    }

    fn update_path(&self, ids: &[RecordId], new_path: &str) -> std::result::Result<usize, Error> {
        Ok(self.set_record_paths(ids, new_path)?)
    }

    fn update_derived_metadata(&self, id: RecordId, blob: &str) -> std::result::Result<(), Error> {
        let updated = self.connection().execute(
            "UPDATE record SET derived_metadata = ?1 WHERE id = ?2",
            params![blob, id],
        )?;
        if updated == 0 {
            return Err(Error::Catalog(format!("record {} not found", id)));
        }
        Ok(())
    }

    /// One transaction: a record that vanished since the inventory was read
    /// rolls back the whole group.
    fn repoint(
        &self,
        ids: &[RecordId],
        new_path: &str,
        blob: &str,
    ) -> std::result::Result<usize, Error> {
        let tx = self.connection().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE record SET path = ?1, derived_metadata = ?2 WHERE id = ?3",
            )?;
            for id in ids {
                if stmt.execute(params![new_path, blob, id])? == 0 {
                    return Err(Error::Catalog(format!("record {} not found", id)));
                }
            }
        }
        tx.commit()?;
        debug!("Repointed {} records to '{}'", ids.len(), new_path);
        Ok(ids.len())
    }

    fn delete_metadata(&self, key: &str) -> std::result::Result<usize, Error> {
        Ok(self.delete_metadata_key(key)?)
    }

    fn insert_metadata(&self, rows: &[MetadataRow]) -> std::result::Result<usize, Error> {
        Ok(self.insert_metadata_rows(rows)?)
    }
}
