//! CLI-specific error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::interceptor::LoaderError;
use crate::locator::LocatorError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read trace: {0}")]
    TraceRead(#[from] std::io::Error),

    #[error("trace line {line}: {source}")]
    TraceParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bundles(#[from] LocatorError),

    #[error("replayed loader call failed: {0}")]
    Replay(#[from] LoaderError),

    #[error("output serialization failed: {0}")]
    Output(#[from] serde_json::Error),

    #[error("runtime start failed: {0}")]
    Runtime(String),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
