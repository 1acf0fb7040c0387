//! `agentlog-store` – the agent's work trail on local SQLite.
//!
//! Two single-file stores with the same lifecycle:
//!
//! - [`work_log`] – [`WorkLog`][work_log::WorkLog]: an append-only audit log
//!   of actions taken, filtered by query substring and action label.
//! - [`work_index`] – [`WorkIndex`][work_index::WorkIndex]: a routing index
//!   keyed by work folder, written with an atomic upsert.
//!
//! Neither store keeps a connection between calls. Every operation opens the
//! file, re-runs the schema check, does its work and drops the handle, so many
//! short-lived processes can share one file and rely on SQLite's own locking.
//!
//! [`schema`] holds the shared connection/ensure helpers and [`paths`] the
//! default file locations.

pub mod paths;
pub mod schema;
pub mod work_index;
pub mod work_log;

pub use paths::{StoreKind, default_db_path, install_base_dir};
pub use schema::{ConnectOptions, StoreError};
pub use work_index::WorkIndex;
pub use work_log::WorkLog;
