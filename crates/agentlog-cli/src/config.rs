//! Configuration – reads `~/.agentlog/config.toml`.
//!
//! Every key is optional; a missing file means all defaults. Environment
//! variables are applied on top of whatever the file says.

use std::fs;
use std::path::{Path, PathBuf};

use agentlog_store::{ConnectOptions, StoreKind, default_db_path, install_base_dir};
use agentlog_types::DEFAULT_QUERY_LIMIT;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings shared by every `agentlog` invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Root under which both default database files are placed. Falls back to
    /// the install location of the binary.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Explicit work log file; wins over `base_dir`.
    #[serde(default)]
    pub work_log_db: Option<PathBuf>,

    /// Explicit work index file; wins over `base_dir`.
    #[serde(default)]
    pub work_index_db: Option<PathBuf>,

    /// How long a write waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Row cap for `query` when `--limit` is not given.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: None,
            work_log_db: None,
            work_index_db: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            default_limit: default_limit(),
        }
    }
}

impl Config {
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::with_busy_timeout_ms(self.busy_timeout_ms)
    }

    /// Database file for `kind`: `explicit` (the `--db` flag), then the
    /// configured file, then the default under the base directory.
    pub fn resolve_db(&self, kind: StoreKind, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let configured = match kind {
            StoreKind::WorkLog => &self.work_log_db,
            StoreKind::WorkIndex => &self.work_index_db,
        };
        if let Some(path) = configured {
            return Ok(path.clone());
        }
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => install_base_dir().context("Failed to locate the agentlog install directory")?,
        };
        Ok(default_db_path(kind, &base))
    }
}

/// Return the path to `~/.agentlog/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".agentlog").join("config.toml")
}

/// Load `path` (defaults when absent) and apply `AGENTLOG_*` overrides.
pub fn load(path: &Path) -> Result<Config> {
    let mut cfg = load_from(path)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config at {}", path.display()))
}

/// Apply environment overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `AGENTLOG_BASE_DIR` | `base_dir` |
/// | `AGENTLOG_WORK_LOG_DB` | `work_log_db` |
/// | `AGENTLOG_WORK_INDEX_DB` | `work_index_db` |
/// | `AGENTLOG_SQLITE_BUSY_MS` | `busy_timeout_ms` |
/// | `AGENTLOG_DEFAULT_LIMIT` | `default_limit` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_with(cfg, |key| std::env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable variable lookup.
pub(crate) fn apply_overrides_with(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
    if let Some(v) = non_empty("AGENTLOG_BASE_DIR") {
        cfg.base_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = non_empty("AGENTLOG_WORK_LOG_DB") {
        cfg.work_log_db = Some(PathBuf::from(v));
    }
    if let Some(v) = non_empty("AGENTLOG_WORK_INDEX_DB") {
        cfg.work_index_db = Some(PathBuf::from(v));
    }
    if let Some(v) = non_empty("AGENTLOG_SQLITE_BUSY_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.busy_timeout_ms = ms;
    }
    if let Some(v) = non_empty("AGENTLOG_DEFAULT_LIMIT")
        && let Ok(limit) = v.parse::<u32>()
    {
        cfg.default_limit = limit;
    }
}
