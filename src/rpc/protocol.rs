//! # RPC Wire Protocol
//!
//! Frame shapes carried over the message channel. Requests and responses
//! travel as two named events; a numeric id ties each response back to
//! the request that caused it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name carrying request frames
pub const REQUEST_EVENT: &str = "rpc.request";
/// Event name carrying response frames
pub const RESPONSE_EVENT: &str = "rpc.response";

/// Code returned when no handler is registered for a method
pub const CODE_METHOD_NOT_FOUND: u16 = 404;
/// Code returned when a handler raised a fault
pub const CODE_HANDLER_FAULT: u16 = 500;

/// A single method invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    pub method_name: String,
    pub id: u64,
    pub args: Value,
}

/// Answer to a request, keyed by the request id. Exactly one of
/// `result` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireFault>,
}

/// Error payload of a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFault {
    pub message: String,
    pub code: u16,
}

impl ResponseFrame {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn fail(id: u64, code: u16, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(WireFault {
                message: message.into(),
                code,
            }),
        }
    }
}
