//! whirr CLI: hybrid search from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Build an index from stdin, one document per line
//! cat docs.txt | whirr index ./myindex
//!
//! # Search it
//! whirr search ./myindex "oauth refresh"
//! whirr search ./myindex "oauth refresh" -k 5 --json
//!
//! # Inspect it
//! whirr info ./myindex
//! ```

mod docs;
mod output;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Two-tier progressive hybrid search.
#[derive(Parser)]
#[command(name = "whirr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Read documents from stdin (one per line) and build an index
    Index {
        /// Index stem; writes <name>.npz, <name>.json, <name>.docs.json
        name: PathBuf,
    },
    /// Search an existing index
    Search {
        /// Index stem to load
        name: PathBuf,
        /// Search query
        query: String,
        /// Number of results per phase
        #[arg(short, default_value = "10")]
        k: usize,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index metadata
    Info {
        /// Index stem to load
        name: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Index { name } => run::index(&name),
        Command::Search {
            name,
            query,
            k,
            json,
        } => run::search(&name, &query, k, json),
        Command::Info { name } => run::info(&name),
    }
}
