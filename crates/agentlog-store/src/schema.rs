//! Schema manager and connection helper shared by both stores.
//!
//! [`connect`] makes sure the parent directory exists, opens the file and sets
//! the busy timeout. [`ensure_schema`] runs a store's `CREATE TABLE IF NOT
//! EXISTS`, checks the live column set against the expected one and only then
//! creates the indexes. A table created by something else is rejected before
//! anything is written to its file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agentlog_types::{StoredMetadata, ValidationError, decode_metadata};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use thiserror::Error;
use tracing::{debug, warn};

/// How long a writer waits on a locked file before failing with `SQLITE_BUSY`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to create directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Table `{table}` does not match the expected schema (found columns: [{found}])")]
    SchemaMismatch { table: &'static str, found: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection options
// ─────────────────────────────────────────────────────────────────────────────

/// Per-connection settings applied on every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub busy_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl ConnectOptions {
    pub fn with_busy_timeout_ms(ms: u64) -> Self {
        Self {
            busy_timeout: Duration::from_millis(ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table schema
// ─────────────────────────────────────────────────────────────────────────────

/// Versionless schema definition of one store.
#[derive(Debug)]
pub struct TableSchema {
    pub table: &'static str,
    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub create_table: &'static str,
    /// `CREATE INDEX IF NOT EXISTS` batch, run once the columns are verified.
    pub indexes: &'static str,
    /// Expected columns in declaration order.
    pub columns: &'static [&'static str],
}

/// Open `path`, creating its parent directories first.
pub(crate) fn connect(path: &Path, options: &ConnectOptions) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(options.busy_timeout)?;
    Ok(conn)
}

/// Idempotently create `schema` and verify the table has the expected columns.
pub(crate) fn ensure_schema(conn: &Connection, schema: &TableSchema) -> Result<(), StoreError> {
    conn.execute_batch(schema.create_table)?;
    let found = table_columns(conn, schema.table)?;
    if found != schema.columns {
        return Err(StoreError::SchemaMismatch {
            table: schema.table,
            found: found.join(", "),
        });
    }
    conn.execute_batch(schema.indexes)?;
    debug!(table = schema.table, "schema ensured");
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Sqlite)
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Read the metadata column as text whatever its storage class.
///
/// The column is declared `JSON`, which gives it NUMERIC affinity, so a blob
/// written by another tool can come back as an integer or real.
pub(crate) fn metadata_text(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    })
}

/// Expand a metadata blob, logging rows whose blob is kept raw.
pub(crate) fn expand_metadata(table: &str, id: i64, blob: Option<String>) -> Option<StoredMetadata> {
    let metadata = decode_metadata(blob);
    if let Some(m) = &metadata
        && m.is_raw()
    {
        warn!(table, id, "stored metadata is not valid JSON; returning raw text");
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES: TableSchema = TableSchema {
        table: "notes",
        create_table: "CREATE TABLE IF NOT EXISTS notes (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
              );",
        indexes: "CREATE INDEX IF NOT EXISTS idx_notes_name ON notes(name);",
        columns: &["id", "name"],
    };

    #[test]
    fn connect_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("a").join("b").join("notes.db");
        let conn = connect(&path, &ConnectOptions::default()).unwrap();
        ensure_schema(&conn, &NOTES).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("notes.db");
        let conn = connect(&path, &ConnectOptions::default()).unwrap();
        for _ in 0..3 {
            ensure_schema(&conn, &NOTES).unwrap();
        }
        assert_eq!(table_columns(&conn, "notes").unwrap(), vec!["id", "name"]);
    }

    #[test]
    fn ensure_schema_rejects_foreign_table() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("notes.db");
        let conn = connect(&path, &ConnectOptions::default()).unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, other TEXT);")
            .unwrap();
        let err = ensure_schema(&conn, &NOTES).unwrap_err();
        match err {
            StoreError::SchemaMismatch { table, found } => {
                assert_eq!(table, "notes");
                assert_eq!(found, "id, other");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn index_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn ensure_schema_creates_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, &NOTES).unwrap();
        assert_eq!(index_names(&conn), vec!["idx_notes_name"]);
    }

    #[test]
    fn rejected_table_gets_no_indexes() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("notes.db");
        let conn = connect(&path, &ConnectOptions::default()).unwrap();
        // Has the indexed column, but not the expected column set.
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, name TEXT, extra TEXT);")
            .unwrap();
        let err = ensure_schema(&conn, &NOTES).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { table: "notes", .. }));
        assert!(index_names(&conn).is_empty());
    }

    #[test]
    fn ensure_schema_fails_on_non_database_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("notes.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();
        let result = connect(&path, &ConnectOptions::default())
            .and_then(|conn| ensure_schema(&conn, &NOTES));
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn metadata_text_reads_any_storage_class() {
        let conn = Connection::open_in_memory().unwrap();
        let values: Vec<Option<String>> = conn
            .prepare("SELECT NULL UNION ALL SELECT 7 UNION ALL SELECT 'txt'")
            .unwrap()
            .query_map([], |row| metadata_text(row, 0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(values, vec![None, Some("7".to_string()), Some("txt".to_string())]);
    }

    #[test]
    fn connect_options_from_millis() {
        let opts = ConnectOptions::with_busy_timeout_ms(250);
        assert_eq!(opts.busy_timeout, Duration::from_millis(250));
        assert_eq!(ConnectOptions::default().busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }
}
