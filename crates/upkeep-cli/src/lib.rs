//! upkeep - keeps third-party Windows applications up to date
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Overview
//!
//! upkeep detects installed software, compares it against a built-in
//! catalog of vendors, and silently runs verified installers for everything
//! that is out of date.
//!
//! # Directory Layout
//!
//! ```text
//! <app data>/
//! ├── upkeep/upkeep.toml  # Optional settings
//! └── .upkeepCache/       # Downloaded installers, deleted after each run
//! ```

pub mod cmd;

pub use upkeep_core::USER_AGENT;
pub use upkeep_core::paths::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "upkeep")]
#[command(author, version, about = "upkeep - keeps third-party Windows applications up to date")]
pub struct Cli {
    /// Seconds an installer may run before it is killed (minimum 120)
    #[arg(short, long, global = true, env = "UPKEEP_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Software ID to leave alone; may be repeated
    #[arg(short, long = "exclude", visible_alias = "except", global = true)]
    pub exclude: Vec<String>,

    /// Only use built-in release information, never ask vendors
    #[arg(long, global = true)]
    pub no_newer: bool,

    /// Read installed software from a JSON snapshot instead of the registry
    #[arg(long, global = true, value_name = "FILE")]
    pub detected: Option<PathBuf>,

    /// Settings file to use instead of <app data>/upkeep/upkeep.toml
    #[arg(long, global = true, env = "UPKEEP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show which installed applications have updates
    #[command(visible_aliases = ["query", "status"])]
    Check,
    /// List installed software
    Detect {
        /// Print JSON suitable for --detected
        #[arg(long)]
        json: bool,
    },
    /// Download and install every available update
    #[command(visible_alias = "upgrade")]
    Update,
    /// List the IDs of every known application
    #[command(visible_aliases = ["list-id", "id-list"])]
    Id,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
