//! CLI argument definitions using clap.
//!
//! Commands:
//! - depscope replay <trace> [--config <path>] [--bundles <path>] [--release] [--query <substring>]
//! - depscope explain <name> [--trace <path>] [--bundles <path>] [--release]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// depscope - offline tooling for the module-dependency inspector
#[derive(Parser, Debug)]
#[command(name = "depscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug-level logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a recorded loader trace and summarize the resulting graph
    Replay {
        /// Path to a JSON-lines trace file
        trace: PathBuf,

        /// Path to a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bundle manifest path, overriding the configured one
        #[arg(long)]
        bundles: Option<PathBuf>,

        /// Assume a minified release layout for file inference
        #[arg(long)]
        release: bool,

        /// Print the modules whose name contains this substring
        #[arg(long)]
        query: Option<String>,
    },

    /// Print the file-path guesses for one module name
    Explain {
        /// Module name, plugin prefix included
        name: String,

        /// Trace to replay first, so dependent scans have edges to walk
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Bundle manifest path
        #[arg(long)]
        bundles: Option<PathBuf>,

        /// Assume a minified release layout for file inference
        #[arg(long)]
        release: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
