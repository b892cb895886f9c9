//! Wire-facing item shapes.
//!
//! Storage keeps relations as id-sets; everything that crosses a channel
//! boundary is flattened to plain arrays first. Field names follow the
//! panel's camelCase convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeSets, FileNode, ModuleNode};

/// Dependency or dependent ids of one module, flattened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEdges {
    #[serde(rename = "static")]
    pub static_: Vec<u64>,
    pub dynamic: Vec<u64>,
}

impl TransferEdges {
    fn from_sets(sets: &EdgeSets) -> Self {
        Self {
            static_: sets.static_.iter().map(|id| id.0).collect(),
            dynamic: sets.dynamic.iter().map(|id| id.0).collect(),
        }
    }
}

/// One module, as `module.getItems` returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferModule {
    pub id: u64,
    pub name: String,
    /// Hosting file id, or null while unknown.
    pub file_id: Option<u64>,
    pub defined: bool,
    pub initialized: bool,
    pub is_deprecated: bool,
    pub dependencies: TransferEdges,
    pub dependent: TransferEdges,
}

impl TransferModule {
    pub fn from_node(node: &ModuleNode) -> Self {
        Self {
            id: node.id.0,
            name: node.name.clone(),
            file_id: node.file_id.map(|id| id.0),
            defined: node.defined,
            initialized: node.initialized,
            is_deprecated: node.deprecated,
            dependencies: TransferEdges::from_sets(&node.dependencies),
            dependent: TransferEdges::from_sets(&node.dependents),
        }
    }
}

/// One file, as `file.getItems` returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFile {
    pub id: u64,
    pub path: String,
    pub name: String,
    pub modules: Vec<u64>,
    pub discovered_at: DateTime<Utc>,
}

impl TransferFile {
    pub fn from_node(node: &FileNode) -> Self {
        Self {
            id: node.id.0,
            path: node.path.clone(),
            name: node.name.clone(),
            modules: node.modules.iter().map(|id| id.0).collect(),
            discovered_at: node.discovered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DefineKind, DependencyGraph, ResourceEntry};

    #[test]
    fn test_module_sets_flatten_to_sorted_arrays() {
        let mut graph = DependencyGraph::new();
        graph.modules.define(
            "App/Main",
            &["Dep/B".to_string(), "Dep/A".to_string()],
            DefineKind::Factory,
        );
        let id = graph.modules.lookup("App/Main").unwrap();
        let module = TransferModule::from_node(graph.modules.get(id).unwrap());

        assert_eq!(module.dependencies.static_.len(), 2);
        let mut sorted = module.dependencies.static_.clone();
        sorted.sort_unstable();
        assert_eq!(module.dependencies.static_, sorted);
        assert!(module.dependencies.dynamic.is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let mut graph = DependencyGraph::new();
        graph
            .modules
            .define("Deprecated/Thing", &[], DefineKind::Object);
        let id = graph.modules.lookup("Deprecated/Thing").unwrap();
        let module = TransferModule::from_node(graph.modules.get(id).unwrap());

        let wire = serde_json::to_value(&module).unwrap();
        assert_eq!(wire["fileId"], serde_json::Value::Null);
        assert_eq!(wire["isDeprecated"], true);
        assert!(wire["dependencies"]["static"].is_array());
        assert!(wire["dependent"]["dynamic"].is_array());
    }

    #[test]
    fn test_file_transfer_carries_discovery_time() {
        let mut graph = DependencyGraph::new();
        let (file, _) = graph.bind_resource(&ResourceEntry::new("/static/app.js?v=1"));
        let transfer = TransferFile::from_node(graph.files.get(file).unwrap());

        assert_eq!(transfer.path, "/static/app.js");
        assert_eq!(transfer.name, "app.js");
        let wire = serde_json::to_value(&transfer).unwrap();
        assert!(wire["discoveredAt"].is_string());
    }
}
