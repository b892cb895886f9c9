//! Module store.
//!
//! Arena of module nodes addressed by integer id, with a name index on top
//! for O(1) lookup either way. Mutated by the loader interceptor, read by
//! the query layer.
//!
//! # API
//!
//! - `define(name, deps, kind)` - Record a definition and its static edges
//! - `require(context, targets)` - Record dynamic edges
//! - `init_module(name)` - Flip the initialized flag
//! - `take_updates(keys)` - Check-and-clear pending-update flags
//! - `get(id)` / `lookup(name)` - Access by id or natural key

use std::collections::{HashMap, HashSet};

use super::module::{EdgeKind, FileId, ModuleId, ModuleNode};
use super::names::{canonical_name, is_callback_free, is_pseudo_dependency, ROOT_MODULE_NAME};

/// How a module definition supplied its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineKind {
    /// A callable factory; the module initializes when the loader runs it.
    Factory,
    /// A plain object literal; there is no execution step.
    Object,
}

/// What one `define` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineOutcome {
    pub id: ModuleId,
    pub newly_defined: bool,
    pub newly_initialized: bool,
    /// Dependency ids whose edge to this module is new.
    pub added: Vec<ModuleId>,
}

impl DefineOutcome {
    pub fn changed(&self) -> bool {
        self.newly_defined || self.newly_initialized || !self.added.is_empty()
    }
}

/// What one `require` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireOutcome {
    pub source: ModuleId,
    /// Target ids whose edge from the source is new.
    pub added: Vec<ModuleId>,
}

impl RequireOutcome {
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Arena of module nodes plus the name index and pending-update set.
#[derive(Debug)]
pub struct ModuleStore {
    nodes: Vec<ModuleNode>,
    by_name: HashMap<String, ModuleId>,
    pending: HashSet<ModuleId>,
    static_edges: usize,
    dynamic_edges: usize,
}

impl ModuleStore {
    /// Id of the synthetic root node owning top-level loader calls.
    pub const ROOT: ModuleId = ModuleId(0);

    pub fn new() -> Self {
        let mut root = ModuleNode::new(Self::ROOT, ROOT_MODULE_NAME);
        root.defined = true;
        root.initialized = true;

        let mut by_name = HashMap::new();
        by_name.insert(root.name.clone(), Self::ROOT);

        Self {
            nodes: vec![root],
            by_name,
            pending: HashSet::new(),
            static_edges: 0,
            dynamic_edges: 0,
        }
    }

    pub fn get(&self, id: ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id.index())
    }

    /// Looks up a module by name after normalization.
    pub fn lookup(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(canonical_name(name)).copied()
    }

    /// All real module ids, excluding the synthetic root.
    pub fn all_ids(&self) -> Vec<ModuleId> {
        (1..self.nodes.len() as u64).map(ModuleId).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.iter().skip(1)
    }

    /// Number of real modules, excluding the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn edge_counts(&self) -> (usize, usize) {
        (self.static_edges, self.dynamic_edges)
    }

    /// Records a module definition: flips `defined` (and `initialized` for
    /// object bodies) and adds a static edge per declared dependency.
    pub fn define(&mut self, name: &str, deps: &[String], kind: DefineKind) -> DefineOutcome {
        let id = self.resolve(name, false);

        let mut newly_defined = false;
        let mut newly_initialized = false;
        {
            let node = &mut self.nodes[id.index()];
            if !node.defined {
                node.defined = true;
                newly_defined = true;
            }
            if kind == DefineKind::Object && !node.initialized {
                node.initialized = true;
                newly_initialized = true;
            }
        }
        if newly_defined || newly_initialized {
            self.pending.insert(id);
        }

        let mut added = Vec::new();
        for dep in deps {
            if is_pseudo_dependency(dep) {
                continue;
            }
            let dep_id = self.resolve(dep, true);
            if self.add_edge(id, dep_id, EdgeKind::Static) {
                added.push(dep_id);
            }
        }

        DefineOutcome {
            id,
            newly_defined,
            newly_initialized,
            added,
        }
    }

    /// Records dynamic edges from the named context (or the root) to every
    /// target. Does not touch defined/initialized flags.
    pub fn require(&mut self, context: Option<&str>, targets: &[String]) -> RequireOutcome {
        let source = match context {
            Some(name) => self.resolve(name, false),
            None => Self::ROOT,
        };
        let source_defined = self.nodes[source.index()].defined;

        let mut added = Vec::new();
        for target in targets {
            if is_pseudo_dependency(target) {
                continue;
            }
            let target_id = self.resolve(target, source_defined);
            if self.add_edge(source, target_id, EdgeKind::Dynamic) {
                added.push(target_id);
            }
        }

        RequireOutcome { source, added }
    }

    /// Flips the initialized flag; reports whether it actually changed.
    pub fn init_module(&mut self, name: &str) -> bool {
        let id = self.resolve(name, false);
        let node = &mut self.nodes[id.index()];
        if node.initialized {
            return false;
        }
        node.initialized = true;
        self.pending.insert(id);
        true
    }

    /// Binds a module to its hosting file. First binding wins.
    pub fn set_file(&mut self, id: ModuleId, file: FileId) -> bool {
        let Some(node) = self.nodes.get_mut(id.index()) else {
            return false;
        };
        if node.file_id.is_some() {
            return false;
        }
        node.file_id = Some(file);
        self.pending.insert(id);
        true
    }

    /// Check-and-clear of the pending-update flags for the given keys.
    ///
    /// Reports true once per changed node, then false until the next
    /// mutation touches it again.
    pub fn take_updates(&mut self, keys: &[ModuleId]) -> Vec<bool> {
        keys.iter().map(|id| self.pending.remove(id)).collect()
    }

    /// Number of nodes with an unconsumed change flag.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Looks a module up by name, creating an undefined node on miss.
    ///
    /// A node created under an already-defined parent whose name carries a
    /// callback-free plugin prefix starts defined and initialized, since
    /// those plugins never report back through `define`.
    fn resolve(&mut self, raw: &str, parent_defined: bool) -> ModuleId {
        let name = canonical_name(raw);
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = ModuleId(self.nodes.len() as u64);
        let mut node = ModuleNode::new(id, name);
        if parent_defined && is_callback_free(name) {
            node.defined = true;
            node.initialized = true;
        }
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        self.pending.insert(id);
        id
    }

    /// Inserts one edge pair, keeping both directions in lockstep.
    ///
    /// Idempotent. A pair occupies at most one of static/dynamic, and
    /// static wins: dynamic-after-static is a no-op, static-after-dynamic
    /// replaces the dynamic pair.
    fn add_edge(&mut self, from: ModuleId, to: ModuleId, kind: EdgeKind) -> bool {
        match self.nodes[from.index()].dependencies.kind_of(to) {
            Some(existing) if existing == kind => return false,
            Some(EdgeKind::Static) => return false,
            Some(EdgeKind::Dynamic) => {
                self.nodes[from.index()]
                    .dependencies
                    .get_mut(EdgeKind::Dynamic)
                    .remove(&to);
                self.nodes[to.index()]
                    .dependents
                    .get_mut(EdgeKind::Dynamic)
                    .remove(&from);
                self.dynamic_edges -= 1;
            }
            None => {}
        }

        self.nodes[from.index()]
            .dependencies
            .get_mut(kind)
            .insert(to);
        self.nodes[to.index()].dependents.get_mut(kind).insert(from);
        match kind {
            EdgeKind::Static => self.static_edges += 1,
            EdgeKind::Dynamic => self.dynamic_edges += 1,
        }
        self.pending.insert(from);
        self.pending.insert(to);
        true
    }
}

impl Default for ModuleStore {
    fn default() -> Self {
        Self::new()
    }
}
