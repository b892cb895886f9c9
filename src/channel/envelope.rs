//! Wire envelope shared by every cross-boundary message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One framed message on a shared transport.
///
/// `source` carries the logical-channel name so several channels can share
/// one physical link; `instance` is only set on broadcast media, where it
/// lets an endpoint drop its own echoes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    pub event: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<Uuid>,
}

impl Envelope {
    pub fn new(source: impl Into<String>, event: impl Into<String>, args: Value) -> Self {
        Self {
            source: source.into(),
            event: event.into(),
            args,
            instance: None,
        }
    }

    pub fn with_instance(mut self, instance: Option<Uuid>) -> Self {
        self.instance = instance;
        self
    }
}
