//! # RPC Errors
//!
//! Error types for the RPC module.

use thiserror::Error;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// RPC errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    // ==================
    // Call Outcomes
    // ==================
    /// No response arrived within the deadline
    #[error("timeout")]
    Timeout,

    /// The remote side answered with an error payload
    #[error("remote fault ({code}): {message}")]
    Remote { code: u16, message: String },

    // ==================
    // Local Failures
    // ==================
    /// A method name was registered twice
    #[error("method already registered: {0}")]
    DuplicateMethod(String),

    /// The channel refused the request dispatch
    #[error("request was not dispatched")]
    Dispatch,

    /// The channel died before a response could arrive
    #[error("channel closed")]
    ChannelClosed,

    /// Argument or result (de)serialization failed
    #[error("codec failure: {0}")]
    Codec(String),
}

impl RpcError {
    /// Error code carried by a remote fault, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            RpcError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Failure raised by a registered method handler. Travels back to the
/// caller as a code-500 response carrying the message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct MethodFault {
    pub message: String,
}

impl MethodFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MethodFault {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}
