//! `agentlog` – command line front end for the agent work trail.
//!
//! Each invocation runs exactly one store operation and exits:
//!
//! ```text
//! agentlog log ensure
//! agentlog log insert --query "fix ci" --action open_pr --metadata '{"pr":12}'
//! agentlog log query --action open_pr --limit 5
//! agentlog index upsert --folder work/ci-fix --summary "Fixed flaky CI job"
//! agentlog index query --folder-like ci
//! ```
//!
//! Query results are printed to stdout as one JSON object per line. Errors go
//! to stderr and exit with status 1.

mod commands;
mod config;
mod telemetry;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use agentlog_store::{StoreKind, WorkIndex, WorkLog};
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use commands::{IndexCmd, LogCmd};

#[derive(Parser, Debug)]
#[command(name = "agentlog", version, about = "Agent work log and routing index")]
struct Cli {
    /// Config file (default: ~/.agentlog/config.toml)
    #[arg(long, global = true, env = "AGENTLOG_CONFIG")]
    config: Option<PathBuf>,
    /// Database file, overriding the configured or default location
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append-only log of actions taken
    Log {
        #[command(subcommand)]
        cmd: LogCmd,
    },
    /// Routing index of work folders
    Index {
        #[command(subcommand)]
        cmd: IndexCmd,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = telemetry::init_tracing("agentlog");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::config_path);
    let cfg = config::load(&config_path)?;
    debug!(config = %config_path.display(), ?cfg, "configuration loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Log { cmd } => {
            let path = cfg.resolve_db(StoreKind::WorkLog, cli.db.as_deref())?;
            let store = WorkLog::with_options(path, cfg.connect_options());
            commands::run_log(cmd, &store, &cfg, &mut out)
        }
        Commands::Index { cmd } => {
            let path = cfg.resolve_db(StoreKind::WorkIndex, cli.db.as_deref())?;
            let store = WorkIndex::with_options(path, cfg.connect_options());
            commands::run_index(cmd, &store, &cfg, &mut out)
        }
    }
}
