//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vigil: signature and heuristic file scanner
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use this configuration file instead of the default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a file or directory
    Scan {
        /// File or directory to scan
        path: PathBuf,

        /// Quarantine every detection without asking
        #[arg(short, long, conflicts_with = "no_action")]
        yes: bool,

        /// Scan only, don't take any action
        #[arg(long)]
        no_action: bool,
    },

    /// Manage quarantined items
    Quarantine {
        #[command(subcommand)]
        action: QuarantineAction,
    },

    /// Update signature database
    ///
    /// Without `--force` the download is applied only when the remote version
    /// string differs from the local one; an identical version is left alone.
    Update {
        /// Replace the local database even if the version is unchanged
        #[arg(short, long)]
        force: bool,

        /// Import signatures from a local database file
        #[arg(long)]
        import: Option<PathBuf>,
    },

    /// Show scan history and system events
    Logs {
        /// Only show the most recent N entries of each log
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show application information
    Info,
}

/// Quarantine subcommands.
#[derive(Subcommand, Debug)]
pub enum QuarantineAction {
    /// List quarantined items
    List,

    /// Restore a quarantined item
    Restore {
        /// ID or original path of the item
        id: String,
    },

    /// Delete a quarantined item permanently
    Delete {
        /// ID or original path of the item
        id: String,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
