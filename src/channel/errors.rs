//! # Channel Errors
//!
//! Error types for the message-channel module.

use thiserror::Error;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel already closed
    #[error("channel closed")]
    Closed,

    /// Backlog retrieval failed; fatal to the pending dispatch
    #[error("backlog pull failed: {0}")]
    BacklogPull(String),
}
