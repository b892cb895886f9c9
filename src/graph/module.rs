//! Node types for the dependency graph.
//!
//! Relations between modules are stored as id-sets rather than references,
//! so the graph stays cycle-safe and transfer serialization stays trivial.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::names::is_deprecated_name;

/// Stable integer identity of a module node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ModuleId(pub u64);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable integer identity of a file node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which relation an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Declared in a module definition.
    Static,
    /// Created by an on-demand load during execution.
    Dynamic,
}

/// Static and dynamic neighbor sets of one node, one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSets {
    pub static_: BTreeSet<ModuleId>,
    pub dynamic: BTreeSet<ModuleId>,
}

impl EdgeSets {
    pub fn get(&self, kind: EdgeKind) -> &BTreeSet<ModuleId> {
        match kind {
            EdgeKind::Static => &self.static_,
            EdgeKind::Dynamic => &self.dynamic,
        }
    }

    pub fn get_mut(&mut self, kind: EdgeKind) -> &mut BTreeSet<ModuleId> {
        match kind {
            EdgeKind::Static => &mut self.static_,
            EdgeKind::Dynamic => &mut self.dynamic,
        }
    }

    /// Which relation holds the given neighbor, if any.
    pub fn kind_of(&self, id: ModuleId) -> Option<EdgeKind> {
        if self.static_.contains(&id) {
            Some(EdgeKind::Static)
        } else if self.dynamic.contains(&id) {
            Some(EdgeKind::Dynamic)
        } else {
            None
        }
    }
}

/// One loader-level module.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub id: ModuleId,
    /// Loader identifier, identity-neutral prefixes already stripped.
    pub name: String,
    /// Hosting file, when known.
    pub file_id: Option<FileId>,
    pub defined: bool,
    pub initialized: bool,
    pub deprecated: bool,
    pub dependencies: EdgeSets,
    pub dependents: EdgeSets,
}

impl ModuleNode {
    pub fn new(id: ModuleId, name: impl Into<String>) -> Self {
        let name = name.into();
        let deprecated = is_deprecated_name(&name);
        Self {
            id,
            name,
            file_id: None,
            defined: false,
            initialized: false,
            deprecated,
            dependencies: EdgeSets::default(),
            dependents: EdgeSets::default(),
        }
    }
}

/// One physical resource (script, style sheet, bundle, ...).
#[derive(Debug, Clone)]
pub struct FileNode {
    pub id: FileId,
    /// Normalized resource URL (query string and fragment stripped).
    pub path: String,
    /// Basename of the path.
    pub name: String,
    /// Modules hosted in this file.
    pub modules: BTreeSet<ModuleId>,
    /// When the resource was first observed.
    pub discovered_at: DateTime<Utc>,
}

/// One observed resource load, as reported by page telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

impl ResourceEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            observed_at: Utc::now(),
        }
    }
}
