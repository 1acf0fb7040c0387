//! Default file locations.
//!
//! Both stores live under a shared base directory:
//!
//! | store | default file |
//! |---|---|
//! | work log | `<base>/work/current/work_logs.db` |
//! | work index | `<base>/work_index/work_index.db` |
//!
//! The base is the install location of the running binary unless the caller
//! supplies one. Nothing here is cached; callers recompute per invocation.

use std::io;
use std::path::{Path, PathBuf};

/// Which of the two stores a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    WorkLog,
    WorkIndex,
}

impl StoreKind {
    fn relative_path(self) -> &'static [&'static str] {
        match self {
            StoreKind::WorkLog => &["work", "current", "work_logs.db"],
            StoreKind::WorkIndex => &["work_index", "work_index.db"],
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::WorkLog => write!(f, "work log"),
            StoreKind::WorkIndex => write!(f, "work index"),
        }
    }
}

/// Default database file for `kind` under `base_dir`.
pub fn default_db_path(kind: StoreKind, base_dir: &Path) -> PathBuf {
    kind.relative_path()
        .iter()
        .fold(base_dir.to_path_buf(), |path, part| path.join(part))
}

/// Base directory derived from the running executable.
pub fn install_base_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(base_dir_for_exe(&exe))
}

/// `<base>/bin/agentlog` maps to `<base>`; any other layout maps to the
/// directory holding the executable.
pub(crate) fn base_dir_for_exe(exe: &Path) -> PathBuf {
    let Some(dir) = exe.parent() else {
        return PathBuf::from(".");
    };
    match (dir.file_name(), dir.parent()) {
        (Some(name), Some(parent)) if name == "bin" => parent.to_path_buf(),
        _ => dir.to_path_buf(),
    }
}
