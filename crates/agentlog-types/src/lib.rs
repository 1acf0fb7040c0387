//! `agentlog-types` – shared record types for the agent work trail.
//!
//! Everything here is pure data: the two record shapes persisted by
//! `agentlog-store`, the write/read parameter structs handed to it by callers,
//! the metadata blob codec, and the validation error taxonomy.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Default number of rows returned by a query when the caller does not say.
pub const DEFAULT_QUERY_LIMIT: u32 = 20;

/// Caller-supplied structured metadata. The store never looks inside it.
pub type Metadata = Map<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Input rejected before any store access is attempted.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("`{0}` must be a non-empty string")]
    EmptyField(&'static str),
    #[error("metadata must be a JSON object")]
    MetadataNotObject,
    #[error("metadata is not valid JSON: {0}")]
    MetadataJson(#[from] serde_json::Error),
}

/// Reject empty required fields. Whitespace is a value like any other.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

/// Optional text columns are NULL when absent, never `""`.
pub fn optional_text(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata blob codec
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata as read back from a row.
///
/// A blob that no longer parses is handed back verbatim as [`StoredMetadata::Raw`]
/// so that a single damaged row never prevents the rest of a query from being
/// returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredMetadata {
    Parsed(Value),
    Raw(String),
}

impl StoredMetadata {
    pub fn is_raw(&self) -> bool {
        matches!(self, StoredMetadata::Raw(_))
    }
}

/// Parse the `--metadata` argument of a CLI write command.
///
/// `null`, `false`, `0`, `""` and `[]` mean "no metadata" and give `None`.
/// Any other value that is not an object is rejected.
pub fn parse_metadata_arg(text: &str) -> Result<Option<Metadata>, ValidationError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(Some(map)),
        value if is_empty_value(&value) => Ok(None),
        _ => Err(ValidationError::MetadataNotObject),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
    }
}

/// Serialise metadata for the TEXT column. An empty mapping is stored as NULL.
pub fn encode_metadata(metadata: Option<&Metadata>) -> Result<Option<String>, ValidationError> {
    match metadata {
        Some(map) if !map.is_empty() => Ok(Some(serde_json::to_string(map)?)),
        _ => Ok(None),
    }
}

/// Expand a stored blob. Never fails; see [`StoredMetadata`].
pub fn decode_metadata(blob: Option<String>) -> Option<StoredMetadata> {
    let blob = blob.filter(|b| !b.is_empty())?;
    Some(match serde_json::from_str::<Value>(&blob) {
        Ok(value) => StoredMetadata::Parsed(value),
        Err(_) => StoredMetadata::Raw(blob),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Current UTC time as ISO-8601 with second precision, e.g.
/// `2026-10-18T09:30:00+00:00`.
pub fn utc_now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Current UTC date, e.g. `2026-10-18`.
pub fn utc_today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkLog records
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the append-only action log.
#[derive(Debug, Clone, Serialize)]
pub struct WorkLogEntry {
    /// Store-assigned, strictly increasing.
    pub id: i64,
    /// ISO-8601 UTC timestamp. Caller-supplied values may be out of order.
    pub timestamp: String,
    /// The request or search query this action served.
    pub query: String,
    /// Caller-defined action label (e.g. `"build"`, `"open_pr"`).
    pub action: String,
    pub detail: Option<String>,
    /// Chat thread reference the action was reported to.
    pub slack_thread: Option<String>,
    /// Free-form output references (paths, URLs).
    pub outputs: Option<String>,
    pub metadata: Option<StoredMetadata>,
}

/// Parameters for appending a [`WorkLogEntry`].
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry {
    pub query: String,
    pub action: String,
    pub detail: Option<String>,
    pub slack_thread: Option<String>,
    pub outputs: Option<String>,
    pub metadata: Option<Metadata>,
    /// Defaults to [`utc_now_timestamp`] at insert time.
    pub timestamp: Option<String>,
}

impl NewLogEntry {
    pub fn new(query: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn slack_thread(mut self, thread: impl Into<String>) -> Self {
        self.slack_thread = Some(thread.into());
        self
    }

    pub fn outputs(mut self, outputs: impl Into<String>) -> Self {
        self.outputs = Some(outputs.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("query", &self.query)?;
        require_non_empty("action", &self.action)
    }
}

/// Read filter for the work log. Both filters are ANDed when present.
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Case-sensitive substring of the `query` column.
    pub query_contains: Option<String>,
    /// Exact `action` label.
    pub action: Option<String>,
    pub limit: u32,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            query_contains: None,
            action: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkIndex records
// ─────────────────────────────────────────────────────────────────────────────

/// One routing entry, keyed by `folder`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkIndexEntry {
    /// Assigned on the first write for this folder and kept on every upsert.
    pub id: i64,
    pub folder: String,
    pub summary: String,
    pub tags: Option<String>,
    pub query_patterns: Option<String>,
    /// `YYYY-MM-DD`.
    pub last_used: Option<String>,
    pub metadata: Option<StoredMetadata>,
}

/// Parameters for inserting or replacing a [`WorkIndexEntry`].
#[derive(Debug, Clone, Default)]
pub struct IndexUpsert {
    pub folder: String,
    pub summary: String,
    pub tags: Option<String>,
    pub query_patterns: Option<String>,
    /// Defaults to [`utc_today`] at write time.
    pub last_used: Option<String>,
    pub metadata: Option<Metadata>,
}

impl IndexUpsert {
    pub fn new(folder: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn query_patterns(mut self, patterns: impl Into<String>) -> Self {
        self.query_patterns = Some(patterns.into());
        self
    }

    pub fn last_used(mut self, date: impl Into<String>) -> Self {
        self.last_used = Some(date.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("folder", &self.folder)?;
        require_non_empty("summary", &self.summary)
    }
}

/// Read filter for the routing index.
#[derive(Debug, Clone)]
pub struct IndexFilter {
    /// Case-sensitive substring of the `folder` column.
    pub folder_contains: Option<String>,
    pub limit: u32,
}

impl Default for IndexFilter {
    fn default() -> Self {
        Self {
            folder_contains: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Metadata {
        match value {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn require_non_empty_rejects_only_empty() {
        assert!(require_non_empty("query", "fix ci").is_ok());
        assert!(require_non_empty("query", "   ").is_ok());
        let err = require_non_empty("query", "").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField("query")));
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn optional_text_maps_empty_to_none() {
        assert_eq!(optional_text(Some("")), None);
        assert_eq!(optional_text(None), None);
        assert_eq!(optional_text(Some("x")), Some("x"));
    }

    #[test]
    fn parse_metadata_arg_requires_object() {
        let m = parse_metadata_arg(r#"{"a":1,"b":[1,2]}"#).unwrap().unwrap();
        assert_eq!(Value::Object(m), json!({"a": 1, "b": [1, 2]}));

        assert!(matches!(
            parse_metadata_arg("[1,2]").unwrap_err(),
            ValidationError::MetadataNotObject
        ));
        assert!(matches!(
            parse_metadata_arg("{not json").unwrap_err(),
            ValidationError::MetadataJson(_)
        ));
        assert!(matches!(
            parse_metadata_arg("\"label\"").unwrap_err(),
            ValidationError::MetadataNotObject
        ));
    }

    #[test]
    fn parse_metadata_arg_treats_empty_values_as_absent() {
        for text in ["null", "[]", "{}", "false", "0", "\"\""] {
            assert_eq!(parse_metadata_arg(text).unwrap(), None, "{text}");
        }
    }

    #[test]
    fn encode_metadata_stores_empty_map_as_null() {
        assert_eq!(encode_metadata(None).unwrap(), None);
        assert_eq!(encode_metadata(Some(&Metadata::new())).unwrap(), None);
        let blob = encode_metadata(Some(&map(json!({"pr": 42})))).unwrap();
        assert_eq!(blob.as_deref(), Some(r#"{"pr":42}"#));
    }

    #[test]
    fn decode_metadata_keeps_unparseable_blob() {
        assert_eq!(decode_metadata(None), None);
        assert_eq!(decode_metadata(Some(String::new())), None);
        assert_eq!(
            decode_metadata(Some(r#"{"a":1}"#.to_string())),
            Some(StoredMetadata::Parsed(json!({"a": 1})))
        );
        let raw = decode_metadata(Some("{broken".to_string())).unwrap();
        assert!(raw.is_raw());
        assert_eq!(raw, StoredMetadata::Raw("{broken".to_string()));
    }

    #[test]
    fn stored_metadata_serializes_untagged() {
        let parsed = StoredMetadata::Parsed(json!({"k": "v"}));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"k":"v"}"#);
        let raw = StoredMetadata::Raw("oops".to_string());
        assert_eq!(serde_json::to_string(&raw).unwrap(), r#""oops""#);
    }

    #[test]
    fn timestamp_has_second_precision_utc() {
        let ts = utc_now_timestamp();
        assert!(ts.ends_with("+00:00"), "{ts}");
        // 2026-10-18T09:30:00+00:00
        assert_eq!(ts.len(), 25, "{ts}");
        assert!(!ts.contains('.'));
    }

    #[test]
    fn today_is_iso_date() {
        let d = utc_today();
        assert_eq!(d.len(), 10);
        assert_eq!(d.as_bytes()[4], b'-');
        assert_eq!(d.as_bytes()[7], b'-');
    }

    #[test]
    fn new_log_entry_validation() {
        assert!(NewLogEntry::new("q", "build").validate().is_ok());
        assert!(matches!(
            NewLogEntry::new("", "build").validate().unwrap_err(),
            ValidationError::EmptyField("query")
        ));
        assert!(matches!(
            NewLogEntry::new("q", "").validate().unwrap_err(),
            ValidationError::EmptyField("action")
        ));
    }

    #[test]
    fn index_upsert_validation() {
        assert!(IndexUpsert::new("work/a", "s").validate().is_ok());
        assert!(matches!(
            IndexUpsert::new("", "s").validate().unwrap_err(),
            ValidationError::EmptyField("folder")
        ));
        assert!(matches!(
            IndexUpsert::new("work/a", "").validate().unwrap_err(),
            ValidationError::EmptyField("summary")
        ));
        assert!(IndexUpsert::new("work/a", " ").validate().is_ok());
    }

    #[test]
    fn filters_default_to_twenty_rows() {
        assert_eq!(LogFilter::default().limit, 20);
        assert_eq!(IndexFilter::default().limit, 20);
    }

    #[test]
    fn log_entry_serializes_nulls() {
        let entry = WorkLogEntry {
            id: 1,
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            query: "q".to_string(),
            action: "a".to_string(),
            detail: None,
            slack_thread: None,
            outputs: None,
            metadata: Some(StoredMetadata::Parsed(json!({"a": 1}))),
        };
        let v: Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["detail"], Value::Null);
        assert_eq!(v["metadata"], json!({"a": 1}));
    }
}
