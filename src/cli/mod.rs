//! CLI argument definitions for qadeck.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qadeck - A QA collaboration backend.
///
/// Start the API with `qadeck serve`. Repair passes and configuration
/// inspection work directly against the data directory.
#[derive(Parser, Debug)]
#[command(name = "qadeck")]
#[command(
    author,
    version,
    about = "A QA collaboration backend for projects, test cases, bugs and tasks",
    long_about = None
)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Directory holding the database, config.kdl and uploads.
    /// Can also be set via QADECK_DATA_DIR environment variable.
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines (or set QADECK_LOG_JSON=true)
    #[arg(long = "log-json", global = true, env = "QADECK_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the JSON API server
    Serve {
        /// Host address to bind to (overrides QADECK_HOST and config.kdl)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides QADECK_PORT and config.kdl)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Repair data that escaped the store's invariants
    Repair {
        #[command(subcommand)]
        command: RepairCommands,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Repair subcommands
#[derive(Subcommand, Debug)]
pub enum RepairCommands {
    /// Renumber duplicate or missing friendly IDs (TC-, BUG-, TASK-)
    Ids {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore missing reverse links and drop links to deleted items
    Links {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,
}
