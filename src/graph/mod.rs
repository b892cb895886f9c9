//! Dependency graph storage.
//!
//! In-memory module and file stores, dual-indexed by integer id and by
//! natural key. Built from scratch for every page instance; nodes are
//! created lazily on first reference and never destroyed.

mod files;
mod module;
mod modules;
pub mod names;

pub use files::{basename, normalize_path, path_matches, FileStore};
pub use module::{
    EdgeKind, EdgeSets, FileId, FileNode, ModuleId, ModuleNode, ResourceEntry,
};
pub use modules::{DefineKind, DefineOutcome, ModuleStore, RequireOutcome};

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

/// Receiver of coalesced graph-change notices.
pub trait ChangeSink: Send + Sync {
    fn graph_changed(&self);
}

/// Sink that drops every notice. Useful for one-shot tooling.
pub struct NullSink;

impl ChangeSink for NullSink {
    fn graph_changed(&self) {}
}

/// Counters summarising the current graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub modules: usize,
    pub files: usize,
    pub static_edges: usize,
    pub dynamic_edges: usize,
}

/// Both stores of one page instance.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub modules: ModuleStore,
    pub files: FileStore,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            modules: ModuleStore::new(),
            files: FileStore::new(),
        }
    }

    pub fn stats(&self) -> GraphStats {
        let (static_edges, dynamic_edges) = self.modules.edge_counts();
        GraphStats {
            modules: self.modules.len(),
            files: self.files.len(),
            static_edges,
            dynamic_edges,
        }
    }

    /// Registers an observed resource load.
    ///
    /// Returns the file id and whether the file is new.
    pub fn bind_resource(&mut self, entry: &ResourceEntry) -> (FileId, bool) {
        self.files.note_resource(entry)
    }

    /// Tries to bind a module to a known file via locator candidates.
    ///
    /// No-op when the module is already bound or nothing matches.
    pub fn bind_candidates(&mut self, module: ModuleId, candidates: &[String]) -> Option<FileId> {
        let node = self.modules.get(module)?;
        if node.file_id.is_some() {
            return None;
        }
        let file = self.files.find_candidate(candidates)?;
        if self.bind(module, file) {
            return Some(file);
        }
        None
    }

    /// Binds a module to a file directly. First binding wins.
    pub fn bind(&mut self, module: ModuleId, file: FileId) -> bool {
        if self.modules.set_file(module, file) {
            self.files.attach(file, module);
            return true;
        }
        false
    }

    /// Modules still lacking a file binding, excluding the root.
    pub fn unbound_modules(&self) -> Vec<ModuleId> {
        self.modules
            .iter()
            .filter(|node| node.file_id.is_none())
            .map(|node| node.id)
            .collect()
    }

    /// Union of the modules hosted by the given files.
    pub fn modules_of_files(&self, files: &[FileId]) -> BTreeSet<ModuleId> {
        let mut out = BTreeSet::new();
        for id in files {
            if let Some(file) = self.files.get(*id) {
                out.extend(file.modules.iter().copied());
            }
        }
        out
    }

    /// Transitive dependents of the seed modules, across both edge kinds.
    ///
    /// Breadth-first over the reverse edges. Seeds are included only when
    /// they are themselves reached through a dependent edge (cycles).
    pub fn dependent_closure(&self, seeds: &BTreeSet<ModuleId>) -> BTreeSet<ModuleId> {
        let mut out = BTreeSet::new();
        let mut queue: VecDeque<ModuleId> = seeds.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            let Some(node) = self.modules.get(id) else {
                continue;
            };
            for kind in [EdgeKind::Static, EdgeKind::Dynamic] {
                for dependent in node.dependents.get(kind) {
                    if out.insert(*dependent) {
                        queue.push_back(*dependent);
                    }
                }
            }
        }
        out
    }
}
