//! Work routing index.
//!
//! Maps a work folder to a summary plus the tags and query patterns used to
//! route a future request back to that folder. One row per folder: writing
//! the same folder again replaces everything but the `id`.
//!
//! # Storage layout
//!
//! | column         | type    | description                              |
//! |----------------|---------|------------------------------------------|
//! | id             | INTEGER | AUTOINCREMENT, kept across upserts       |
//! | folder         | TEXT    | UNIQUE key                               |
//! | summary        | TEXT    | Human-readable summary                   |
//! | tags           | TEXT    | Optional free text                       |
//! | query_patterns | TEXT    | Optional free text                       |
//! | last_used      | TEXT    | `YYYY-MM-DD`                             |
//! | metadata       | JSON    | Optional JSON object, stored as text     |

use std::path::{Path, PathBuf};

use agentlog_types::{
    IndexFilter, IndexUpsert, WorkIndexEntry, encode_metadata, optional_text, utc_today,
};
use rusqlite::{Connection, params, params_from_iter, types::Value};
use tracing::{debug, instrument};

use crate::schema::{self, ConnectOptions, StoreError, TableSchema};

pub const WORK_INDEX_SCHEMA: TableSchema = TableSchema {
    table: "work_index",
    create_table: "CREATE TABLE IF NOT EXISTS work_index (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            folder         TEXT NOT NULL UNIQUE,
            summary        TEXT NOT NULL,
            tags           TEXT,
            query_patterns TEXT,
            last_used      TEXT,
            metadata       JSON
          );",
    indexes: "CREATE INDEX IF NOT EXISTS idx_work_index_folder ON work_index(folder);
          CREATE INDEX IF NOT EXISTS idx_work_index_last_used ON work_index(last_used);",
    columns: &[
        "id",
        "folder",
        "summary",
        "tags",
        "query_patterns",
        "last_used",
        "metadata",
    ],
};

// Single statement keyed on the UNIQUE constraint; no read-then-write window.
const UPSERT_SQL: &str = "INSERT INTO work_index (folder, summary, tags, query_patterns, last_used, metadata)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(folder) DO UPDATE SET
       summary        = excluded.summary,
       tags           = excluded.tags,
       query_patterns = excluded.query_patterns,
       last_used      = excluded.last_used,
       metadata       = excluded.metadata";

/// Handle to a work index file.
#[derive(Debug, Clone)]
pub struct WorkIndex {
    path: PathBuf,
    options: ConnectOptions,
}

impl WorkIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, ConnectOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: ConnectOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = schema::connect(&self.path, &self.options)?;
        schema::ensure_schema(&conn, &WORK_INDEX_SCHEMA)?;
        Ok(conn)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn ensure(&self) -> Result<(), StoreError> {
        self.open().map(drop)
    }

    /// Insert `entry`, or replace the non-key columns of its folder's row.
    #[instrument(skip(self, entry), fields(path = %self.path.display(), folder = %entry.folder))]
    pub fn upsert(&self, entry: &IndexUpsert) -> Result<(), StoreError> {
        entry.validate()?;
        let metadata = encode_metadata(entry.metadata.as_ref())?;
        let last_used = optional_text(entry.last_used.as_deref())
            .map(str::to_string)
            .unwrap_or_else(utc_today);

        let conn = self.open()?;
        conn.execute(
            UPSERT_SQL,
            params![
                entry.folder,
                entry.summary,
                optional_text(entry.tags.as_deref()),
                optional_text(entry.query_patterns.as_deref()),
                last_used,
                metadata,
            ],
        )?;
        debug!("work index entry upserted");
        Ok(())
    }

    /// Entries ordered by `last_used` (newest first), at most `filter.limit`.
    #[instrument(skip(self, filter), fields(path = %self.path.display(), limit = filter.limit))]
    pub fn query(&self, filter: &IndexFilter) -> Result<Vec<WorkIndexEntry>, StoreError> {
        let mut sql = String::from(
            "SELECT id, folder, summary, tags, query_patterns, last_used, metadata FROM work_index",
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(needle) = optional_text(filter.folder_contains.as_deref()) {
            sql.push_str(" WHERE instr(folder, ?1) > 0");
            args.push(Value::Text(needle.to_string()));
        }
        args.push(Value::Integer(i64::from(filter.limit)));
        sql.push_str(&format!(" ORDER BY last_used DESC, id DESC LIMIT ?{}", args.len()));

        let conn = self.open()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_entry)?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(rows = entries.len(), "work index queried");
        Ok(entries)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkIndexEntry> {
    let id: i64 = row.get(0)?;
    let blob = schema::metadata_text(row, 6)?;
    Ok(WorkIndexEntry {
        id,
        folder: row.get(1)?,
        summary: row.get(2)?,
        tags: row.get(3)?,
        query_patterns: row.get(4)?,
        last_used: row.get(5)?,
        metadata: schema::expand_metadata(WORK_INDEX_SCHEMA.table, id, blob),
    })
}
