//! CLI command implementations.
//!
//! The replay harness drives a recorded trace through the same interceptor
//! path a live page uses, against the simulated page environment, so graph
//! semantics can be inspected offline.

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AgentConfig;
use crate::graph::{DependencyGraph, GraphStats, ModuleId, NullSink, ResourceEntry};
use crate::interceptor::testing::{named_define, noop_factory, object_define, FakeLoader, FakePage};
use crate::interceptor::LoaderInterceptor;
use crate::locator::{BundleMap, FileLocator};
use crate::methods::{module_query, TransferModule};
use crate::query::QueryParam;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// One recorded loader operation, as a JSON-lines trace stores it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceLine {
    Define {
        name: String,
        #[serde(default)]
        deps: Vec<String>,
        /// True when the recorded call passed an object literal instead of
        /// a factory.
        #[serde(default)]
        object: bool,
    },
    Require {
        #[serde(default)]
        context: Option<String>,
        targets: Vec<String>,
    },
    Resource {
        url: String,
    },
    Init {
        name: String,
    },
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Replay {
            trace,
            config,
            bundles,
            release,
            query,
        } => replay(
            &trace,
            config.as_deref(),
            bundles.as_deref(),
            release,
            query.as_deref(),
        ),
        Command::Explain {
            name,
            trace,
            bundles,
            release,
        } => explain(&name, trace.as_deref(), bundles.as_deref(), release),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("depscope=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("depscope=info"))
    };
    let fmt_layer = fmt::layer().with_target(false).compact();
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Replays a trace, then prints graph counters and any requested modules.
pub fn replay(
    trace_path: &Path,
    config_path: Option<&Path>,
    bundles: Option<&Path>,
    release: bool,
    query: Option<&str>,
) -> CliResult<()> {
    let config = effective_config(config_path, bundles, release)?;
    let locator = Arc::new(build_locator(&config)?);
    let graph = replay_graph(trace_path, &locator)?;

    print_stats(&graph.stats());
    if let Some(needle) = query {
        print_modules(&graph, needle)?;
    }
    Ok(())
}

/// Prints the locator's file guesses for one module name.
pub fn explain(
    name: &str,
    trace_path: Option<&Path>,
    bundles: Option<&Path>,
    release: bool,
) -> CliResult<()> {
    let config = effective_config(None, bundles, release)?;
    let locator = Arc::new(build_locator(&config)?);
    let graph = match trace_path {
        Some(path) => replay_graph(path, &locator)?,
        None => DependencyGraph::new(),
    };

    let candidates = locator.candidates(name, &graph);
    if candidates.is_empty() {
        println!("no file guesses for {}", name);
    } else {
        for path in candidates {
            println!("{}", path);
        }
    }
    Ok(())
}

/// Parses a JSON-lines trace. Blank lines are skipped; a malformed line
/// fails with its 1-based line number.
pub fn parse_trace(content: &str) -> CliResult<Vec<TraceLine>> {
    let mut lines = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = serde_json::from_str(raw).map_err(|source| CliError::TraceParse {
            line: index + 1,
            source,
        })?;
        lines.push(line);
    }
    Ok(lines)
}

fn effective_config(
    config_path: Option<&Path>,
    bundles: Option<&Path>,
    release: bool,
) -> CliResult<AgentConfig> {
    let mut config = match config_path {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(path) = bundles {
        config.bundle_manifest = Some(path.to_path_buf());
    }
    if release {
        config.release_mode = true;
    }
    Ok(config)
}

fn build_locator(config: &AgentConfig) -> CliResult<FileLocator> {
    let bundles = match &config.bundle_manifest {
        Some(path) => BundleMap::from_file(path)?,
        None => BundleMap::new(),
    };
    Ok(FileLocator::new(bundles, config.release_mode))
}

/// Replays a trace file into a fresh graph.
///
/// Owns a private tokio runtime so callers stay synchronous; the runtime
/// hosts the interceptor's deferred-recording consumer for the duration of
/// the replay.
fn replay_graph(trace_path: &Path, locator: &Arc<FileLocator>) -> CliResult<DependencyGraph> {
    let lines = parse_trace(&fs::read_to_string(trace_path)?)?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    rt.block_on(async {
        let interceptor = LoaderInterceptor::new(
            Arc::new(RwLock::new(DependencyGraph::new())),
            Arc::clone(locator),
            Arc::new(NullSink),
        );
        let page = FakePage::new();
        interceptor.install(&page)?;
        page.assign_loader(FakeLoader::new());

        drive(&interceptor, &page, &lines)?;
        interceptor.settle().await;

        // The replay is over; take the graph out of its shared cell.
        let shared = interceptor.graph();
        let mut slot = shared.write().unwrap();
        Ok(std::mem::take(&mut *slot))
    })
}

fn drive(interceptor: &LoaderInterceptor, page: &FakePage, lines: &[TraceLine]) -> CliResult<()> {
    for line in lines {
        match line {
            TraceLine::Define { name, deps, object } => {
                let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                let args = if *object {
                    object_define(name, &deps, json!({}))
                } else {
                    named_define(name, &deps, noop_factory())
                };
                page.call_define(args)?;
            }
            TraceLine::Require { context, targets } => {
                let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
                page.call_require(context.as_deref(), &targets)?;
            }
            TraceLine::Resource { url } => {
                interceptor.observe_resource(&ResourceEntry::new(url));
            }
            TraceLine::Init { name } => {
                let graph = interceptor.graph();
                graph.write().unwrap().modules.init_module(name);
            }
        }
    }
    Ok(())
}

fn print_stats(stats: &GraphStats) {
    println!(
        "modules: {}  files: {}  static edges: {}  dynamic edges: {}",
        stats.modules, stats.files, stats.static_edges, stats.dynamic_edges
    );
}

fn print_modules(graph: &DependencyGraph, needle: &str) -> CliResult<()> {
    let param = QueryParam::new()
        .with_filter("name", Value::from(needle))
        .with_sort("name", true);
    let page = module_query(graph, &param);
    for id in &page.data {
        if let Some(node) = graph.modules.get(ModuleId(*id)) {
            println!("{}", serde_json::to_string(&TransferModule::from_node(node))?);
        }
    }
    Ok(())
}
