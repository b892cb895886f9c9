//! CLI module for depscope
//!
//! Provides the command-line interface for:
//! - replay: rebuild a graph from a recorded loader trace, print a summary
//! - explain: print the file-path guesses for one module name
//!
//! Development tooling only; the library carries all the semantics.

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{explain, parse_trace, replay, run, run_command, TraceLine};
pub use errors::{CliError, CliResult};
