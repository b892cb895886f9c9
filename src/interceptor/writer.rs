//! Shared mutation handle.
//!
//! Every observed loader event funnels through one [`GraphWriter`], which
//! bundles the graph lock with the file locator and the change sink, so
//! each mutation both lands in storage and feeds the coalesced `update`
//! notification.

use std::sync::{Arc, RwLock};

use crate::graph::{ChangeSink, DefineKind, DependencyGraph, ResourceEntry};
use crate::locator::FileLocator;

/// Writes observed loader activity into the graph.
#[derive(Clone)]
pub struct GraphWriter {
    graph: Arc<RwLock<DependencyGraph>>,
    locator: Arc<FileLocator>,
    sink: Arc<dyn ChangeSink>,
}

impl GraphWriter {
    pub fn new(
        graph: Arc<RwLock<DependencyGraph>>,
        locator: Arc<FileLocator>,
        sink: Arc<dyn ChangeSink>,
    ) -> Self {
        Self {
            graph,
            locator,
            sink,
        }
    }

    pub fn graph(&self) -> Arc<RwLock<DependencyGraph>> {
        Arc::clone(&self.graph)
    }

    /// Records a define: flags, static edges, and a file-binding attempt
    /// for the defining module and every dependency the call introduced.
    pub fn record_define(&self, name: &str, deps: &[String], object_body: bool) {
        let changed = {
            let mut graph = self.graph.write().unwrap();
            let kind = if object_body {
                DefineKind::Object
            } else {
                DefineKind::Factory
            };
            let outcome = graph.modules.define(name, deps, kind);
            let mut changed = outcome.changed();

            let mut targets = vec![outcome.id];
            targets.extend(outcome.added.iter().copied());
            for id in targets {
                let candidate_name = match graph.modules.get(id) {
                    Some(node) if node.file_id.is_none() => node.name.clone(),
                    _ => continue,
                };
                let candidates = self.locator.candidates(&candidate_name, &graph);
                if graph.bind_candidates(id, &candidates).is_some() {
                    changed = true;
                }
            }
            changed
        };
        if changed {
            self.sink.graph_changed();
        }
    }

    /// Records dynamic edges from `context` (or the root) to `targets`.
    pub fn record_require(&self, context: Option<&str>, targets: &[String]) {
        let outcome = self
            .graph
            .write()
            .unwrap()
            .modules
            .require(context, targets);
        if outcome.changed() {
            self.sink.graph_changed();
        }
    }

    /// Flips a module's initialized flag.
    pub fn record_init(&self, name: &str) {
        let flipped = self.graph.write().unwrap().modules.init_module(name);
        if flipped {
            self.sink.graph_changed();
        }
    }

    /// Notes a resource observation and retries file binding for every
    /// still-unbound module against the enlarged file set.
    pub fn record_resource(&self, entry: &ResourceEntry) {
        let changed = {
            let mut graph = self.graph.write().unwrap();
            let (file, new) = graph.bind_resource(entry);
            if !new {
                tracing::trace!(url = %entry.url, file = file.0, "resource already known");
                false
            } else {
                let mut changed = true;
                for id in graph.unbound_modules() {
                    let name = match graph.modules.get(id) {
                        Some(node) => node.name.clone(),
                        None => continue,
                    };
                    let candidates = self.locator.candidates(&name, &graph);
                    if graph.bind_candidates(id, &candidates).is_some() {
                        changed = true;
                    }
                }
                changed
            }
        };
        if changed {
            self.sink.graph_changed();
        }
    }
}
