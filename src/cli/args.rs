//! CLI argument definitions using clap
//!
//! Commands:
//! - gitdb datasets --config <path>
//! - gitdb show <dataset> [--block <name>] --config <path>
//! - gitdb reindex --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitdb - an embedded record store versioned by commits
#[derive(Parser, Debug)]
#[command(name = "gitdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./gitdb.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List datasets with their block and record counts
    Datasets,

    /// Show the blocks of a dataset, or the records of one block
    Show {
        /// Dataset name
        dataset: String,

        /// Block to render as a table
        #[arg(long)]
        block: Option<String>,
    },

    /// Rebuild every index from block contents
    Reindex,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
