//! Store subcommands: argument structs and their handlers.
//!
//! Handlers write query records to `out`, one JSON object per line, so that
//! they can be exercised against a buffer in tests.

use std::io::Write;

use agentlog_store::{WorkIndex, WorkLog};
use agentlog_types::{IndexFilter, IndexUpsert, LogFilter, Metadata, NewLogEntry, parse_metadata_arg};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::config::Config;

// ─────────────────────────────────────────────────────────────────────────────
// Work log
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum LogCmd {
    /// Create the database and table if missing
    Ensure,
    /// Append a log entry
    Insert(LogInsertArgs),
    /// Print log entries, newest first
    Query(LogQueryArgs),
}

#[derive(Args, Debug)]
pub struct LogInsertArgs {
    /// Request or search query the action served
    #[arg(long)]
    pub query: String,
    /// Action label
    #[arg(long)]
    pub action: String,
    #[arg(long)]
    pub detail: Option<String>,
    /// Chat thread reference
    #[arg(long)]
    pub slack_thread: Option<String>,
    #[arg(long)]
    pub outputs: Option<String>,
    /// JSON object
    #[arg(long)]
    pub metadata: Option<String>,
    /// ISO-8601 timestamp (default: now, UTC)
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogQueryArgs {
    /// Case-sensitive substring of the query column
    #[arg(long)]
    pub query_like: Option<String>,
    /// Exact action label
    #[arg(long)]
    pub action: Option<String>,
    /// Maximum rows (default from config, 20)
    #[arg(long)]
    pub limit: Option<u32>,
}

pub fn run_log(cmd: LogCmd, store: &WorkLog, cfg: &Config, out: &mut impl Write) -> Result<()> {
    match cmd {
        LogCmd::Ensure => store
            .ensure()
            .with_context(|| format!("Failed to initialise {}", store.path().display())),
        LogCmd::Insert(args) => {
            let entry = NewLogEntry {
                metadata: parse_metadata(args.metadata.as_deref())?,
                query: args.query,
                action: args.action,
                detail: args.detail,
                slack_thread: args.slack_thread,
                outputs: args.outputs,
                timestamp: args.timestamp,
            };
            store
                .insert(&entry)
                .with_context(|| format!("Failed to write to {}", store.path().display()))?;
            Ok(())
        }
        LogCmd::Query(args) => {
            let filter = LogFilter {
                query_contains: args.query_like,
                action: args.action,
                limit: args.limit.unwrap_or(cfg.default_limit),
            };
            let rows = store
                .query(&filter)
                .with_context(|| format!("Failed to read {}", store.path().display()))?;
            print_records(out, &rows)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Work index
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum IndexCmd {
    /// Create the database and table if missing
    Ensure,
    /// Insert or replace the entry for a folder
    Upsert(IndexUpsertArgs),
    /// Print routing entries, most recently used first
    Query(IndexQueryArgs),
}

#[derive(Args, Debug)]
pub struct IndexUpsertArgs {
    /// Work folder (unique key)
    #[arg(long)]
    pub folder: String,
    #[arg(long)]
    pub summary: String,
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long)]
    pub query_patterns: Option<String>,
    /// YYYY-MM-DD (default: today, UTC)
    #[arg(long)]
    pub last_used: Option<String>,
    /// JSON object
    #[arg(long)]
    pub metadata: Option<String>,
}

#[derive(Args, Debug)]
pub struct IndexQueryArgs {
    /// Case-sensitive substring of the folder column
    #[arg(long)]
    pub folder_like: Option<String>,
    /// Maximum rows (default from config, 20)
    #[arg(long)]
    pub limit: Option<u32>,
}

pub fn run_index(cmd: IndexCmd, store: &WorkIndex, cfg: &Config, out: &mut impl Write) -> Result<()> {
    match cmd {
        IndexCmd::Ensure => store
            .ensure()
            .with_context(|| format!("Failed to initialise {}", store.path().display())),
        IndexCmd::Upsert(args) => {
            let entry = IndexUpsert {
                metadata: parse_metadata(args.metadata.as_deref())?,
                folder: args.folder,
                summary: args.summary,
                tags: args.tags,
                query_patterns: args.query_patterns,
                last_used: args.last_used,
            };
            store
                .upsert(&entry)
                .with_context(|| format!("Failed to write to {}", store.path().display()))
        }
        IndexCmd::Query(args) => {
            let filter = IndexFilter {
                folder_contains: args.folder_like,
                limit: args.limit.unwrap_or(cfg.default_limit),
            };
            let rows = store
                .query(&filter)
                .with_context(|| format!("Failed to read {}", store.path().display()))?;
            print_records(out, &rows)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_metadata(raw: Option<&str>) -> Result<Option<Metadata>> {
    match raw.filter(|r| !r.is_empty()) {
        Some(text) => parse_metadata_arg(text).context("Invalid --metadata"),
        None => Ok(None),
    }
}

fn print_records<T: Serialize>(out: &mut impl Write, rows: &[T]) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *out, row)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
