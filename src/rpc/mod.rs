//! Request/response messaging over named-event channels.
//!
//! Layered on [`crate::channel`]: requests and responses are plain
//! envelope events, so any [`Channel`](crate::channel::Channel)
//! implementation can carry calls. See [`RpcEndpoint`] for the entry
//! point and [`protocol`] for the wire shapes.

mod endpoint;
mod errors;
pub mod protocol;

pub use endpoint::{MethodHandler, RpcEndpoint, DEFAULT_TIMEOUT};
pub use errors::{MethodFault, RpcError, RpcResult};
