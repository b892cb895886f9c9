//! depscope - live dependency inspection for AMD-style page loaders
//!
//! Instruments a page's `require`/`define` hooks, maintains a bidirectional
//! module/file graph, and serves a query/RPC surface to a remote inspector
//! panel over named-event channels.

pub mod channel;
pub mod cli;
pub mod config;
pub mod graph;
pub mod interceptor;
pub mod locator;
pub mod methods;
pub mod query;
pub mod rpc;
