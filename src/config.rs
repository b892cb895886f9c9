//! # Agent Configuration
//!
//! JSON-file configuration for the instrumentation agent. Every field has a
//! serde default, so a missing field or an empty `{}` file yields a working
//! setup; an absent file is the caller's concern.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Logical channel name both ends attach to.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// Outbound RPC deadline, in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Quiet window for coalescing `update` notices, in milliseconds.
    #[serde(default = "default_update_debounce_ms")]
    pub update_debounce_ms: u64,

    /// Transport queue depth before envelopes spill into the backlog.
    #[serde(default = "default_transport_queue")]
    pub transport_queue: usize,

    /// Whether file inference assumes a minified release layout.
    #[serde(default)]
    pub release_mode: bool,

    /// Bundle manifest path (bundle file -> member module names).
    #[serde(default)]
    pub bundle_manifest: Option<PathBuf>,
}

fn default_channel_name() -> String {
    "depscope".to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_update_debounce_ms() -> u64 {
    100
}

fn default_transport_queue() -> usize {
    64
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            channel_name: default_channel_name(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            update_debounce_ms: default_update_debounce_ms(),
            transport_queue: default_transport_queue(),
            release_mode: false,
            bundle_manifest: None,
        }
    }
}

impl AgentConfig {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn update_debounce(&self) -> Duration {
        Duration::from_millis(self.update_debounce_ms)
    }
}
