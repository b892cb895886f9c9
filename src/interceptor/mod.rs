//! Loader interception.
//!
//! Observes a page's already-running module loader through an injectable
//! [`LoaderEnv`] and turns observed require/define activity into graph
//! mutations. Interception is strictly additive: every call is delegated
//! to the original callable, recording failures are logged and swallowed,
//! and the host page keeps working even when observation does not.
//!
//! Require edges are recorded synchronously; define edges are recorded
//! one turn later on the interceptor's FIFO work queue, so a reader
//! mid-frame can briefly see require edges ahead of define edges from
//! the same turn. [`LoaderInterceptor::settle`] waits that window out.

mod define;
mod env;
mod errors;
mod queue;
pub mod testing;
mod wrappers;
mod writer;

pub use define::{
    classify, DefineArg, DefineBody, DefineCall, DefineShape, FactoryImport, FactoryLike,
    ImportFacade,
};
pub use env::{
    DefineLike, DefineSlot, HookState, LoaderEnv, MarkerCell, RequireLike, RequireSlot,
};
pub use errors::{LoaderError, LoaderResult};
pub use writer::GraphWriter;

use std::sync::{Arc, Mutex, RwLock};

use crate::graph::{ChangeSink, DependencyGraph, ResourceEntry};
use crate::locator::FileLocator;

use queue::WorkQueue;
use wrappers::{DefineHook, RequireHook};

/// Owns the recording pipeline and wires it into a page environment.
pub struct LoaderInterceptor {
    writer: GraphWriter,
    queue: WorkQueue,
    slots: Mutex<Option<(Arc<RequireSlot>, Arc<DefineSlot>)>>,
}

impl LoaderInterceptor {
    /// Builds the interceptor and spawns its deferred-recording consumer
    /// on the current tokio runtime.
    pub fn new(
        graph: Arc<RwLock<DependencyGraph>>,
        locator: Arc<FileLocator>,
        sink: Arc<dyn ChangeSink>,
    ) -> Self {
        let writer = GraphWriter::new(graph, locator, sink);
        let queue = WorkQueue::spawn(writer.clone());
        Self {
            writer,
            queue,
            slots: Mutex::new(None),
        }
    }

    /// Hooks both loader slots of `env`. Fails if this interceptor (or
    /// another one) already claimed them.
    pub fn install(&self, env: &dyn LoaderEnv) -> LoaderResult<()> {
        let mut slots = self.slots.lock().unwrap();
        if slots.is_some() {
            return Err(LoaderError::AlreadyInstalled);
        }
        let require = env.require_slot();
        let define = env.define_slot();
        require.install(RequireHook {
            writer: self.writer.clone(),
        })?;
        define.install(DefineHook {
            writer: self.writer.clone(),
            queue: self.queue.clone(),
        })?;
        *slots = Some((require, define));
        tracing::info!("loader interceptor installed");
        Ok(())
    }

    /// Feeds one resource-loading observation into the graph.
    pub fn observe_resource(&self, entry: &ResourceEntry) {
        self.writer.record_resource(entry);
    }

    /// Resolves once every deferred recording enqueued so far has run.
    pub async fn settle(&self) {
        self.queue.settle().await;
    }

    /// The graph this interceptor writes into.
    pub fn graph(&self) -> Arc<RwLock<DependencyGraph>> {
        self.writer.graph()
    }

    pub fn require_state(&self) -> HookState {
        self.slots
            .lock()
            .unwrap()
            .as_ref()
            .map(|(require, _)| require.state())
            .unwrap_or(HookState::Unset)
    }

    pub fn define_state(&self) -> HookState {
        self.slots
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, define)| define.state())
            .unwrap_or(HookState::Unset)
    }
}
