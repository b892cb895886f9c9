//! Method Surface Tests
//!
//! The inspector methods served over a real port pair:
//! - Query narrowing, item shapes, and update drains all cross the wire
//! - Source opening resolves through the hosting file
//! - A full recording session reaches the panel as one debounced notice

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::sleep;

use depscope::channel::{pair_transport, Channel, PortChannel};
use depscope::graph::{DefineKind, DependencyGraph, FileNode, ResourceEntry};
use depscope::interceptor::testing::{named_define, noop_factory, FakeLoader, FakePage};
use depscope::interceptor::LoaderInterceptor;
use depscope::locator::{BundleMap, FileLocator};
use depscope::methods::{register_all, AgentContext, SourceOpener, UpdateNotifier, UPDATE_EVENT};
use depscope::query::QueryPage;
use depscope::rpc::RpcEndpoint;

fn deps(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Agent endpoint serving `context` on one end of a port pair, panel
/// endpoint on the other. The agent channel comes back separately so a
/// notifier can broadcast on it.
fn wired(context: AgentContext) -> (RpcEndpoint, RpcEndpoint, Arc<dyn Channel>) {
    let (agent_link, panel_link) = pair_transport(64);
    let agent_channel: Arc<dyn Channel> =
        Arc::new(PortChannel::attach("depscope", agent_link.into()));
    let panel_channel: Arc<dyn Channel> =
        Arc::new(PortChannel::attach("depscope", panel_link.into()));
    let agent = RpcEndpoint::new(Arc::clone(&agent_channel));
    register_all(&agent, context).unwrap();
    (agent, RpcEndpoint::new(panel_channel), agent_channel)
}

/// Modules 1 App/Main, 2 App/Header, 3 css!App/skin, 4 App/Lazy; file 0
/// hosts Main and Header. Main is initialized, Lazy was only required.
fn inspected_graph() -> Arc<RwLock<DependencyGraph>> {
    let mut graph = DependencyGraph::new();
    graph.modules.define(
        "App/Main",
        &deps(&["App/Header", "css!App/skin"]),
        DefineKind::Factory,
    );
    graph.modules.define("App/Header", &[], DefineKind::Factory);
    graph.modules.require(Some("App/Main"), &deps(&["App/Lazy"]));
    graph.modules.init_module("App/Main");

    let (bundle, _) = graph.bind_resource(&ResourceEntry::new("/static/app/bundle.js"));
    for name in ["App/Main", "App/Header"] {
        let id = graph.modules.lookup(name).unwrap();
        assert!(graph.bind(id, bundle));
    }
    Arc::new(RwLock::new(graph))
}

// =============================================================================
// Wire Queries
// =============================================================================

/// A `files` filter sent by the panel narrows to the hosted modules.
#[tokio::test]
async fn test_module_query_narrows_by_files_over_the_wire() {
    let (_agent, panel, _) = wired(AgentContext::new(inspected_graph()));

    let page: QueryPage = panel
        .execute(
            "module.query",
            json!({"where": {"files": [0]}, "sortBy": {"name": true}}),
        )
        .await
        .unwrap();

    assert_eq!(page.data, vec![2, 1]);
    assert!(!page.has_more);
}

/// `dependentOnFiles` walks the closure; seeds only survive when some
/// dependent chain leads back to them.
#[tokio::test]
async fn test_dependent_closure_narrowing_over_the_wire() {
    let (_agent, panel, _) = wired(AgentContext::new(inspected_graph()));

    let page: QueryPage = panel
        .execute("module.query", json!({"where": {"dependentOnFiles": [0]}}))
        .await
        .unwrap();

    // Header's only dependent is Main; nothing depends on Main itself.
    assert_eq!(page.data, vec![1]);
}

// =============================================================================
// Item Shapes
// =============================================================================

/// `module.getItems` flattens edges and keeps an explicit null file id
/// for unbound modules; unknown ids drop out.
#[tokio::test]
async fn test_get_items_wire_shape() {
    let (_agent, panel, _) = wired(AgentContext::new(inspected_graph()));

    let items: Value = panel
        .execute("module.getItems", json!([1, 4, 77]))
        .await
        .unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);

    let main = &items[0];
    assert_eq!(main["name"], "App/Main");
    assert_eq!(main["fileId"], 0);
    assert_eq!(main["initialized"], true);
    assert_eq!(main["isDeprecated"], false);
    assert_eq!(main["dependencies"]["static"], json!([2, 3]));
    assert_eq!(main["dependencies"]["dynamic"], json!([4]));

    let lazy = &items[1];
    assert_eq!(lazy["name"], "App/Lazy");
    assert_eq!(lazy["defined"], false);
    assert!(lazy["fileId"].is_null());
    assert!(lazy.as_object().unwrap().contains_key("fileId"));
}

/// `file.getItems` reports the hosted module ids.
#[tokio::test]
async fn test_file_items_list_their_modules() {
    let (_agent, panel, _) = wired(AgentContext::new(inspected_graph()));

    let items: Value = panel.execute("file.getItems", json!([0])).await.unwrap();
    assert_eq!(items[0]["path"], "/static/app/bundle.js");
    assert_eq!(items[0]["modules"], json!([1, 2]));
}

// =============================================================================
// Update Drain
// =============================================================================

/// `module.hasUpdates` reports and clears per-module change flags.
#[tokio::test]
async fn test_has_updates_drains_over_the_wire() {
    let (_agent, panel, _) = wired(AgentContext::new(inspected_graph()));

    let flags: Vec<bool> = panel
        .execute("module.hasUpdates", json!([1, 2, 3, 4]))
        .await
        .unwrap();
    assert_eq!(flags, vec![true, true, true, true]);

    let flags: Vec<bool> = panel
        .execute("module.hasUpdates", json!([1, 2, 3, 4]))
        .await
        .unwrap();
    assert_eq!(flags, vec![false, false, false, false]);
}

// =============================================================================
// Source Opening
// =============================================================================

struct RecordingOpener {
    seen: Mutex<Vec<String>>,
}

impl SourceOpener for RecordingOpener {
    fn open(&self, file: &FileNode) -> bool {
        self.seen.lock().unwrap().push(file.path.clone());
        true
    }
}

/// `module.openSource` reaches the host opener for bound modules only.
#[tokio::test]
async fn test_open_source_over_the_wire() {
    let opener = Arc::new(RecordingOpener {
        seen: Mutex::new(Vec::new()),
    });
    let context = AgentContext::with_opener(
        inspected_graph(),
        Arc::clone(&opener) as Arc<dyn SourceOpener>,
    );
    let (_agent, panel, _) = wired(context);

    let opened: bool = panel.execute("module.openSource", json!(1)).await.unwrap();
    assert!(opened);
    assert_eq!(
        opener.seen.lock().unwrap().as_slice(),
        ["/static/app/bundle.js"]
    );

    let unbound: bool = panel.execute("module.openSource", json!(4)).await.unwrap();
    assert!(!unbound);
    let unknown: bool = panel.execute("module.openSource", json!(99)).await.unwrap();
    assert!(!unknown);
}

// =============================================================================
// Live Session
// =============================================================================

/// The whole pipeline at once: an intercepted page feeds the graph, the
/// burst of mutations reaches the panel as one debounced notice, and the
/// panel's queries see the recorded modules with their file binding.
#[tokio::test(start_paused = true)]
async fn test_live_session_reaches_the_panel() {
    let graph = Arc::new(RwLock::new(DependencyGraph::new()));
    let (_agent, panel, agent_channel) = wired(AgentContext::new(Arc::clone(&graph)));

    let (tx, mut rx) = mpsc::unbounded_channel();
    panel.channel().subscribe(
        UPDATE_EVENT,
        Arc::new(move |value| {
            let _ = tx.send(value);
        }),
    );

    let notifier = UpdateNotifier::new(agent_channel, Duration::from_millis(50));
    let interceptor = LoaderInterceptor::new(
        graph,
        Arc::new(FileLocator::new(BundleMap::new(), false)),
        notifier,
    );
    let page = FakePage::new();
    interceptor.install(&page).unwrap();
    page.assign_loader(FakeLoader::new());

    page.call_define(named_define(
        "App/Widget",
        &["css!App/widget"],
        noop_factory(),
    ))
    .unwrap();
    page.call_require(Some("App/Widget"), &["App/Popup"]).unwrap();
    interceptor.observe_resource(&ResourceEntry::new("https://host/static/App/Widget.js?v=7"));
    interceptor.settle().await;

    // The mutation burst collapses into a single update notice.
    sleep(Duration::from_millis(120)).await;
    assert_eq!(rx.recv().await, Some(Value::Null));
    sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());

    // Ids follow recording order: the synchronous require created
    // App/Widget and App/Popup before the deferred define added the
    // stylesheet dependency.
    let found: QueryPage = panel
        .execute(
            "module.query",
            json!({"where": {"name": "widget"}, "sortBy": {"name": true}}),
        )
        .await
        .unwrap();
    assert_eq!(found.data, vec![1, 3]);

    // The resource observation bound the widget to its script.
    let items: Value = panel.execute("module.getItems", json!([1])).await.unwrap();
    assert_eq!(items[0]["name"], "App/Widget");
    assert_eq!(items[0]["fileId"], 0);
    assert_eq!(items[0]["initialized"], true);

    let flags: Vec<bool> = panel
        .execute("module.hasUpdates", json!([1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(flags, vec![true, true, true]);
    let flags: Vec<bool> = panel
        .execute("module.hasUpdates", json!([1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(flags, vec![false, false, false]);
}
