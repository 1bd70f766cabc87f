use super::models::TextColumns;
use super::queries::quote_ident;
use super::sqlite::Database;
use crate::catalog::ReferenceRewriter;
use crate::error::Error;
use rusqlite::params;
use std::cell::OnceCell;
use tracing::{debug, warn};

/// Rewrites path references in every text column of the database.
///
/// Column discovery runs once, on first use.
pub struct SqliteRewriter<'a> {
    db: &'a Database,
    columns: OnceCell<Vec<TextColumns>>,
}

impl<'a> SqliteRewriter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            columns: OnceCell::new(),
        }
    }

    fn columns(&self) -> Result<&[TextColumns], Error> {
        if let Some(columns) = self.columns.get() {
            return Ok(columns);
        }
        let discovered = self.db.text_columns()?;
        debug!(
            "Discovered {} text columns across {} tables",
            discovered.iter().map(|t| t.columns.len()).sum::<usize>(),
            discovered.len()
        );
        Ok(self.columns.get_or_init(|| discovered))
    }
}

impl ReferenceRewriter for SqliteRewriter<'_> {
    fn exists_anywhere(&self, needle: &str) -> Result<bool, Error> {
        if needle.is_empty() {
            return Ok(false);
        }
        let tables = self.columns()?;
        if tables.is_empty() {
            // Nothing searchable: assume referenced so the rewrite still runs.
            warn!("No text columns to probe, assuming '{}' is referenced", needle);
            return Ok(true);
        }

        for table in tables {
            let predicate = table
                .columns
                .iter()
                .map(|c| format!("instr({}, ?1) > 0", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(" OR ");
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {})",
                quote_ident(&table.table),
                predicate
            );
            let found: bool = self
                .db
                .connection()
                .query_row(&sql, params![needle], |row| row.get(0))?;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn rewrite(&self, from: &str, to: &str) -> Result<usize, Error> {
        if from.is_empty() || from == to {
            return Ok(0);
        }
        let tx = self.db.connection().unchecked_transaction()?;
        let mut touched = 0;
        for table in self.columns()? {
            for column in &table.columns {
                let col = quote_ident(column);
                let sql = format!(
                    "UPDATE {} SET {col} = REPLACE({col}, ?1, ?2) WHERE instr({col}, ?1) > 0",
                    quote_ident(&table.table),
                );
                touched += tx.execute(&sql, params![from, to])?;
            }
        }
        tx.commit()?;
        Ok(touched)
    }
}
