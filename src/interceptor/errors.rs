//! # Interceptor Errors
//!
//! Error types for the loader interceptor.

use thiserror::Error;

/// Result type for loader interception operations
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Loader interception errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoaderError {
    // ==================
    // Hook Lifecycle
    // ==================
    /// A hook was invoked before the page assigned a callable to it
    #[error("{0} hook has no assigned callable")]
    HookUnset(&'static str),

    /// `install` was called on an environment that is already wired up
    #[error("interceptor is already installed")]
    AlreadyInstalled,

    // ==================
    // Observation
    // ==================
    /// A define call used an argument arrangement we cannot classify
    #[error("unrecognized define shape with {0} argument(s)")]
    UnrecognizedShape(usize),

    /// Failure raised by the underlying loader callable itself
    #[error("loader failure: {0}")]
    Loader(String),
}
