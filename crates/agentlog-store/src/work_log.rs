//! Append-only work log.
//!
//! Records every action the agent takes against the request it served. Rows
//! are never updated or deleted; `id` is the insertion order and `timestamp`
//! the display order.
//!
//! # Storage layout
//!
//! | column       | type    | description                                  |
//! |--------------|---------|----------------------------------------------|
//! | id           | INTEGER | AUTOINCREMENT primary key                    |
//! | timestamp    | TEXT    | ISO-8601 UTC, second precision               |
//! | query        | TEXT    | Originating request or search query          |
//! | action       | TEXT    | Caller-defined action label                  |
//! | detail       | TEXT    | Optional free text                           |
//! | slack_thread | TEXT    | Optional chat thread reference               |
//! | outputs      | TEXT    | Optional output references                   |
//! | metadata     | JSON    | Optional JSON object, stored as text         |
//!
//! # Example
//!
//! ```rust
//! use agentlog_store::WorkLog;
//! use agentlog_types::{LogFilter, NewLogEntry};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let log = WorkLog::new(dir.path().join("work_logs.db"));
//!
//! log.insert(&NewLogEntry::new("fix flaky test", "open_pr").detail("PR #12")).unwrap();
//!
//! let rows = log.query(&LogFilter::default()).unwrap();
//! assert_eq!(rows[0].action, "open_pr");
//! ```

use std::path::{Path, PathBuf};

use agentlog_types::{
    LogFilter, NewLogEntry, WorkLogEntry, encode_metadata, optional_text, utc_now_timestamp,
};
use rusqlite::{Connection, params, params_from_iter, types::Value};
use tracing::{debug, instrument};

use crate::schema::{self, ConnectOptions, StoreError, TableSchema};

pub const WORK_LOG_SCHEMA: TableSchema = TableSchema {
    table: "work_logs",
    create_table: "CREATE TABLE IF NOT EXISTS work_logs (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp    TEXT NOT NULL,
            query        TEXT NOT NULL,
            action       TEXT NOT NULL,
            detail       TEXT,
            slack_thread TEXT,
            outputs      TEXT,
            metadata     JSON
          );",
    indexes: "CREATE INDEX IF NOT EXISTS idx_work_logs_ts ON work_logs(timestamp);
          CREATE INDEX IF NOT EXISTS idx_work_logs_query ON work_logs(query);",
    columns: &[
        "id",
        "timestamp",
        "query",
        "action",
        "detail",
        "slack_thread",
        "outputs",
        "metadata",
    ],
};

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, query, action, detail, slack_thread, outputs, metadata FROM work_logs";

// ─────────────────────────────────────────────────────────────────────────────
// WorkLog
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a work log file. Holds no connection; see the crate docs.
#[derive(Debug, Clone)]
pub struct WorkLog {
    path: PathBuf,
    options: ConnectOptions,
}

impl WorkLog {
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
        schema::ensure_schema(&conn, &WORK_LOG_SCHEMA)?;
        Ok(conn)
    }

    /// Create the file, table and indexes if they are missing.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn ensure(&self) -> Result<(), StoreError> {
        self.open().map(drop)
    }

    /// Append one entry and return its id.
    ///
    /// `query` and `action` are checked before the file is touched.
    #[instrument(skip(self, entry), fields(path = %self.path.display(), action = %entry.action))]
    pub fn insert(&self, entry: &NewLogEntry) -> Result<i64, StoreError> {
        entry.validate()?;
        let metadata = encode_metadata(entry.metadata.as_ref())?;
        let timestamp = optional_text(entry.timestamp.as_deref())
            .map(str::to_string)
            .unwrap_or_else(utc_now_timestamp);

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO work_logs (timestamp, query, action, detail, slack_thread, outputs, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                timestamp,
                entry.query,
                entry.action,
                optional_text(entry.detail.as_deref()),
                optional_text(entry.slack_thread.as_deref()),
                optional_text(entry.outputs.as_deref()),
                metadata,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, "work log entry appended");
        Ok(id)
    }

    /// Most recent entries first (by `timestamp`, then `id`), at most
    /// `filter.limit` of them.
    #[instrument(skip(self, filter), fields(path = %self.path.display(), limit = filter.limit))]
    pub fn query(&self, filter: &LogFilter) -> Result<Vec<WorkLogEntry>, StoreError> {
        let mut clauses = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(needle) = optional_text(filter.query_contains.as_deref()) {
            args.push(Value::Text(needle.to_string()));
            clauses.push(format!("instr(query, ?{}) > 0", args.len()));
        }
        if let Some(action) = optional_text(filter.action.as_deref()) {
            args.push(Value::Text(action.to_string()));
            clauses.push(format!("action = ?{}", args.len()));
        }
        args.push(Value::Integer(i64::from(filter.limit)));
        let limit_idx = args.len();

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY timestamp DESC, id DESC LIMIT ?{limit_idx}"));

        let conn = self.open()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_entry)?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(rows = entries.len(), "work log queried");
        Ok(entries)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkLogEntry> {
    let id: i64 = row.get(0)?;
    let blob = schema::metadata_text(row, 7)?;
    Ok(WorkLogEntry {
        id,
        timestamp: row.get(1)?,
        query: row.get(2)?,
        action: row.get(3)?,
        detail: row.get(4)?,
        slack_thread: row.get(5)?,
        outputs: row.get(6)?,
        metadata: schema::expand_metadata(WORK_LOG_SCHEMA.table, id, blob),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
