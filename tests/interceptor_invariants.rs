//! Interception Invariant Tests
//!
//! The observe-then-delegate pipeline end to end:
//! - Named define shapes record; anonymous shapes only delegate
//! - File binding runs through bundles, formatters, and importer scans
//! - Loader faults pass through with observations already recorded
//! - Every effective mutation raises exactly one change notice

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::json;

use depscope::graph::{ChangeSink, DependencyGraph, NullSink, ResourceEntry};
use depscope::interceptor::testing::{
    named_define, noop_factory, object_define, FakeLoader, FakePage, LoaderCall,
};
use depscope::interceptor::{DefineArg, LoaderError, LoaderInterceptor};
use depscope::locator::{BundleMap, FileLocator};

fn rig_with(
    locator: FileLocator,
    sink: Arc<dyn ChangeSink>,
) -> (LoaderInterceptor, FakePage, Arc<FakeLoader>) {
    let interceptor = LoaderInterceptor::new(
        Arc::new(RwLock::new(DependencyGraph::new())),
        Arc::new(locator),
        sink,
    );
    let page = FakePage::new();
    interceptor.install(&page).unwrap();
    let loader = FakeLoader::new();
    page.assign_loader(loader.clone());
    (interceptor, page, loader)
}

fn rig() -> (LoaderInterceptor, FakePage, Arc<FakeLoader>) {
    rig_with(FileLocator::new(BundleMap::new(), false), Arc::new(NullSink))
}

// =============================================================================
// Define Shapes
// =============================================================================

/// Two-argument factory, two-argument object, and three-argument object
/// defines all land as named modules.
#[tokio::test]
async fn test_named_define_shapes_all_record() {
    let (interceptor, page, _loader) = rig();

    page.call_define(vec![
        DefineArg::Text("App/Solo".into()),
        DefineArg::Factory(noop_factory()),
    ])
    .unwrap();
    page.call_define(vec![
        DefineArg::Text("App/Config".into()),
        DefineArg::Data(json!({"debug": true})),
    ])
    .unwrap();
    page.call_define(object_define("App/Theme", &["css!App/theme"], json!("dark")))
        .unwrap();
    interceptor.settle().await;

    let graph = interceptor.graph();
    let graph = graph.read().unwrap();

    let solo = graph.modules.lookup("App/Solo").unwrap();
    let solo = graph.modules.get(solo).unwrap();
    assert!(solo.defined);
    // Factory bodies initialize once the delegated call returns.
    assert!(solo.initialized);
    assert!(solo.dependencies.static_.is_empty());

    let config = graph.modules.lookup("App/Config").unwrap();
    assert!(graph.modules.get(config).unwrap().initialized);

    let theme = graph.modules.lookup("App/Theme").unwrap();
    let theme = graph.modules.get(theme).unwrap();
    assert_eq!(theme.dependencies.static_.len(), 1);
}

/// Anonymous defines reach the loader untouched and leave no graph trace.
#[tokio::test]
async fn test_anonymous_defines_delegate_unrecorded() {
    let (interceptor, page, loader) = rig();

    page.call_define(vec![DefineArg::Factory(noop_factory())])
        .unwrap();
    page.call_define(vec![
        DefineArg::List(vec!["Dep/One".into()]),
        DefineArg::Factory(noop_factory()),
    ])
    .unwrap();
    interceptor.settle().await;

    let calls = loader.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls
        .iter()
        .all(|call| matches!(call, LoaderCall::Define { name: None, .. })));
    assert!(interceptor.graph().read().unwrap().modules.is_empty());
}

// =============================================================================
// File Binding
// =============================================================================

/// Bundle manifest membership beats every formatter guess.
#[tokio::test]
async fn test_bundled_module_binds_to_its_bundle() {
    let mut bundles = BundleMap::new();
    bundles.insert("packed/forms.min.js", ["Forms/Input", "Forms/Select"]);
    let (interceptor, page, _loader) =
        rig_with(FileLocator::new(bundles, false), Arc::new(NullSink));

    interceptor.observe_resource(&ResourceEntry::new("https://host/packed/forms.min.js"));
    page.call_define(named_define("Forms/Input", &[], noop_factory()))
        .unwrap();
    interceptor.settle().await;

    let graph = interceptor.graph();
    let graph = graph.read().unwrap();
    let input = graph.modules.lookup("Forms/Input").unwrap();
    let file = graph.modules.get(input).unwrap().file_id.unwrap();
    assert_eq!(
        graph.files.get(file).unwrap().path,
        "https://host/packed/forms.min.js"
    );
}

/// Release pages serve minified scripts; plain artifacts stay unbound.
#[tokio::test]
async fn test_release_mode_expects_minified_scripts() {
    let (interceptor, page, _loader) =
        rig_with(FileLocator::new(BundleMap::new(), true), Arc::new(NullSink));

    interceptor.observe_resource(&ResourceEntry::new("/static/app/App/Fast.min.js"));
    interceptor.observe_resource(&ResourceEntry::new("/static/app/App/Slow.js"));
    page.call_define(named_define("App/Fast", &[], noop_factory()))
        .unwrap();
    page.call_define(named_define("App/Slow", &[], noop_factory()))
        .unwrap();
    interceptor.settle().await;

    let graph = interceptor.graph();
    let graph = graph.read().unwrap();
    let fast = graph.modules.lookup("App/Fast").unwrap();
    assert!(graph.modules.get(fast).unwrap().file_id.is_some());
    let slow = graph.modules.lookup("App/Slow").unwrap();
    assert!(graph.modules.get(slow).unwrap().file_id.is_none());
}

/// A stylesheet with no served .css of its own binds to the script of
/// the module that statically imports it.
#[tokio::test]
async fn test_style_binds_through_its_importer() {
    let (interceptor, page, _loader) = rig();

    page.call_define(named_define("App/Main", &["css!App/skin"], noop_factory()))
        .unwrap();
    interceptor.settle().await;
    interceptor.observe_resource(&ResourceEntry::new("https://host/x/App/Main.js"));

    let graph = interceptor.graph();
    let graph = graph.read().unwrap();
    let main = graph.modules.lookup("App/Main").unwrap();
    let skin = graph.modules.lookup("css!App/skin").unwrap();
    let main_file = graph.modules.get(main).unwrap().file_id.unwrap();
    let skin_file = graph.modules.get(skin).unwrap().file_id.unwrap();
    assert_eq!(skin_file, main_file);

    let file = graph.files.get(main_file).unwrap();
    assert!(file.modules.contains(&main));
    assert!(file.modules.contains(&skin));
}

// =============================================================================
// Failure Isolation
// =============================================================================

/// A require the loader rejects still leaves its dynamic edge behind,
/// and the rejection reaches the caller unchanged.
#[tokio::test]
async fn test_failed_require_keeps_observed_edge() {
    let (interceptor, page, loader) = rig();
    loader.fail_next("network down");

    let err = page
        .call_require(Some("App/Owner"), &["App/Risky"])
        .unwrap_err();
    assert_eq!(err, LoaderError::Loader("network down".into()));

    let graph = interceptor.graph();
    let graph = graph.read().unwrap();
    let owner = graph.modules.lookup("App/Owner").unwrap();
    let risky = graph.modules.lookup("App/Risky").unwrap();
    assert!(graph
        .modules
        .get(owner)
        .unwrap()
        .dependencies
        .dynamic
        .contains(&risky));
    // The loader never saw the call it rejected.
    assert!(loader.calls().is_empty());
}

// =============================================================================
// Change Notices
// =============================================================================

struct CountingSink(AtomicUsize);

impl ChangeSink for CountingSink {
    fn graph_changed(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Every mutation that flips something notifies once; repeats stay quiet.
#[tokio::test]
async fn test_each_effective_change_notifies_once() {
    let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
    let (interceptor, page, _loader) =
        rig_with(FileLocator::new(BundleMap::new(), false), sink.clone());

    page.call_define(named_define("App/Widget", &["Dep/One"], noop_factory()))
        .unwrap();
    interceptor.settle().await;
    // One notice for the define recording, one for the init flip.
    assert_eq!(sink.0.load(Ordering::SeqCst), 2);

    page.call_define(named_define("App/Widget", &["Dep/One"], noop_factory()))
        .unwrap();
    interceptor.settle().await;
    assert_eq!(sink.0.load(Ordering::SeqCst), 2);

    page.call_require(Some("App/Widget"), &["App/Extra"]).unwrap();
    assert_eq!(sink.0.load(Ordering::SeqCst), 3);
    page.call_require(Some("App/Widget"), &["App/Extra"]).unwrap();
    assert_eq!(sink.0.load(Ordering::SeqCst), 3);

    interceptor.observe_resource(&ResourceEntry::new("https://host/js/Dep/One.js"));
    assert_eq!(sink.0.load(Ordering::SeqCst), 4);
    // Same path modulo the query string: already known, no notice.
    interceptor.observe_resource(&ResourceEntry::new("https://host/js/Dep/One.js?v=2"));
    assert_eq!(sink.0.load(Ordering::SeqCst), 4);

    let graph = interceptor.graph();
    let graph = graph.read().unwrap();
    let dep = graph.modules.lookup("Dep/One").unwrap();
    assert!(graph.modules.get(dep).unwrap().file_id.is_some());
}
