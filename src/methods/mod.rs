//! # Inspector Method Surface
//!
//! The six RPC methods the panel calls, bound to a shared graph:
//! `module.query`, `module.getItems`, `module.hasUpdates`,
//! `module.openSource`, `file.query`, `file.getItems`.
//!
//! Query handlers resolve a candidate id set first (explicit keys, `files`
//! narrowing, `dependentOnFiles` closure), then hand the surviving rows to
//! the generic filter/sort/paginate pipeline. Graph mutations are announced
//! through the debounced [`UpdateNotifier`]; consumers re-query, nothing is
//! pushed.

mod notify;
mod transfer;

pub use notify::{UpdateNotifier, DEFAULT_DEBOUNCE, UPDATE_EVENT};
pub use transfer::{TransferEdges, TransferFile, TransferModule};

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::info;

use crate::graph::{DependencyGraph, FileId, FileNode, ModuleId, ModuleNode};
use crate::query::tables::{FILE_TABLES, MODULE_TABLES};
use crate::query::{run_query, QueryPage, QueryParam};
use crate::rpc::{RpcEndpoint, RpcResult};

/// Opens a file in whatever source viewer the host offers.
pub trait SourceOpener: Send + Sync {
    fn open(&self, file: &FileNode) -> bool;
}

/// Fallback opener: announces the path and claims success.
pub struct LogOpener;

impl SourceOpener for LogOpener {
    fn open(&self, file: &FileNode) -> bool {
        info!(path = %file.path, "open source requested");
        true
    }
}

/// Everything the method handlers need, cheaply cloneable per closure.
#[derive(Clone)]
pub struct AgentContext {
    pub graph: Arc<RwLock<DependencyGraph>>,
    pub opener: Arc<dyn SourceOpener>,
}

impl AgentContext {
    pub fn new(graph: Arc<RwLock<DependencyGraph>>) -> Self {
        Self {
            graph,
            opener: Arc::new(LogOpener),
        }
    }

    pub fn with_opener(graph: Arc<RwLock<DependencyGraph>>, opener: Arc<dyn SourceOpener>) -> Self {
        Self { graph, opener }
    }
}

/// Registers the full method surface on one endpoint.
pub fn register_all(rpc: &RpcEndpoint, context: AgentContext) -> RpcResult<()> {
    let ctx = context.clone();
    rpc.register_fn("module.query", move |args| {
        let param: QueryParam = serde_json::from_value(args)?;
        let graph = ctx.graph.read().unwrap();
        Ok(serde_json::to_value(module_query(&graph, &param))?)
    })?;

    let ctx = context.clone();
    rpc.register_fn("module.getItems", move |args| {
        let ids: Vec<u64> = serde_json::from_value(args)?;
        let graph = ctx.graph.read().unwrap();
        let items: Vec<TransferModule> = ids
            .iter()
            .filter_map(|id| graph.modules.get(ModuleId(*id)))
            .map(TransferModule::from_node)
            .collect();
        Ok(serde_json::to_value(items)?)
    })?;

    let ctx = context.clone();
    rpc.register_fn("module.hasUpdates", move |args| {
        let ids: Vec<u64> = serde_json::from_value(args)?;
        let keys: Vec<ModuleId> = ids.into_iter().map(ModuleId).collect();
        let mut graph = ctx.graph.write().unwrap();
        Ok(serde_json::to_value(graph.modules.take_updates(&keys))?)
    })?;

    let ctx = context.clone();
    rpc.register_fn("module.openSource", move |args| {
        let id: u64 = serde_json::from_value(args)?;
        Ok(Value::Bool(open_module_source(&ctx, id)))
    })?;

    let ctx = context.clone();
    rpc.register_fn("file.query", move |args| {
        let param: QueryParam = serde_json::from_value(args)?;
        let graph = ctx.graph.read().unwrap();
        Ok(serde_json::to_value(file_query(&graph, &param))?)
    })?;

    let ctx = context;
    rpc.register_fn("file.getItems", move |args| {
        let ids: Vec<u64> = serde_json::from_value(args)?;
        let graph = ctx.graph.read().unwrap();
        let items: Vec<TransferFile> = ids
            .iter()
            .filter_map(|id| graph.files.get(FileId(*id)))
            .map(TransferFile::from_node)
            .collect();
        Ok(serde_json::to_value(items)?)
    })?;

    Ok(())
}

/// `module.query` body: candidate narrowing, then the generic pipeline.
pub fn module_query(graph: &DependencyGraph, param: &QueryParam) -> QueryPage {
    let candidates = module_candidates(graph, param);
    let rows: Vec<(u64, &ModuleNode)> = candidates
        .iter()
        .filter_map(|id| graph.modules.get(*id).map(|m| (id.0, m)))
        .collect();
    run_query(rows, param, &MODULE_TABLES)
}

/// `file.query` body. Explicit keys override the full scan, in given order.
pub fn file_query(graph: &DependencyGraph, param: &QueryParam) -> QueryPage {
    let candidates: Vec<FileId> = match &param.keys {
        Some(keys) => keys.iter().copied().map(FileId).collect(),
        None => graph.files.all_ids(),
    };
    let rows: Vec<(u64, &FileNode)> = candidates
        .iter()
        .filter_map(|id| graph.files.get(*id).map(|f| (id.0, f)))
        .collect();
    run_query(rows, param, &FILE_TABLES)
}

/// Resolves `module.query`'s candidate id set.
///
/// A `files` filter narrows to the modules those files host, and a
/// `dependentOnFiles` filter to the transitive dependents of the files'
/// modules. Explicit keys, `files`, and `dependentOnFiles` all intersect
/// when present together; with none of them, every module is a candidate.
/// The two file keys never reach the per-item tables, so narrowing replaces
/// a membership scan instead of duplicating it.
pub fn module_candidates(graph: &DependencyGraph, param: &QueryParam) -> Vec<ModuleId> {
    let mut narrowed: Option<BTreeSet<ModuleId>> = param
        .keys
        .as_ref()
        .map(|keys| keys.iter().copied().map(ModuleId).collect());

    if let Some(files) = param.filter.get("files").and_then(file_id_list) {
        let hosted = graph.modules_of_files(&files);
        narrowed = Some(intersect(narrowed, hosted));
    }
    if let Some(files) = param.filter.get("dependentOnFiles").and_then(file_id_list) {
        let seeds = graph.modules_of_files(&files);
        let closure = graph.dependent_closure(&seeds);
        narrowed = Some(intersect(narrowed, closure));
    }

    match narrowed {
        Some(set) => set.into_iter().collect(),
        None => graph.modules.all_ids(),
    }
}

fn open_module_source(context: &AgentContext, id: u64) -> bool {
    let graph = context.graph.read().unwrap();
    graph
        .modules
        .get(ModuleId(id))
        .and_then(|module| module.file_id)
        .and_then(|file| graph.files.get(file))
        .map(|file| context.opener.open(file))
        .unwrap_or(false)
}

fn intersect(current: Option<BTreeSet<ModuleId>>, incoming: BTreeSet<ModuleId>) -> BTreeSet<ModuleId> {
    match current {
        Some(set) => set.intersection(&incoming).copied().collect(),
        None => incoming,
    }
}

/// Reads a file-id array filter value. A non-array disables the key, like
/// any other rejected filter value; non-numeric entries are skipped.
fn file_id_list(value: &Value) -> Option<Vec<FileId>> {
    let items = value.as_array()?;
    Some(items.iter().filter_map(Value::as_u64).map(FileId).collect())
}
