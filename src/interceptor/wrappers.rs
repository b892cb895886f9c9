//! Call-recording wrappers.
//!
//! Each wrapper forwards to an inner callable while recording what it
//! saw. Recording failures are logged and swallowed at this boundary;
//! failures of the wrapped callable itself pass through untouched, so
//! interception never changes what the host page observes.

use std::sync::Arc;

use serde_json::Value;

use crate::graph::names::is_import_facade;

use super::define::{
    classify, DefineArg, DefineBody, DefineCall, FactoryImport, FactoryLike, ImportFacade,
};
use super::errors::LoaderResult;
use super::queue::{Job, WorkQueue};
use super::writer::GraphWriter;

// ==================
// Hook Glue
// ==================

/// Recording side of an intercepted require call.
#[derive(Clone)]
pub(crate) struct RequireHook {
    pub writer: GraphWriter,
}

impl RequireHook {
    /// Records dynamic edges before the call is delegated.
    pub fn observe(&self, context: Option<&str>, targets: &[String]) {
        self.writer.record_require(context, targets);
    }
}

/// Recording side of an intercepted define call.
#[derive(Clone)]
pub(crate) struct DefineHook {
    pub writer: GraphWriter,
    pub queue: WorkQueue,
}

/// What the define wrapper hands back to the slot: the (possibly
/// rewritten) argument vector plus a notice to enqueue after the
/// delegated call succeeds.
pub(crate) struct ObservedDefine {
    pub args: Vec<DefineArg>,
    pub after: Option<Job>,
}

impl DefineHook {
    /// Classifies one define call, queues its deferred edge recording,
    /// and swaps the factory for a recording one when the declared
    /// dependencies reference any dynamic-import facade.
    pub fn observe(&self, args: Vec<DefineArg>) -> ObservedDefine {
        let (shape, call) = match classify(&args) {
            Ok(classified) => classified,
            Err(error) => {
                tracing::warn!(%error, args = ?args, "define call left unobserved");
                return ObservedDefine { args, after: None };
            }
        };
        tracing::trace!(?shape, name = ?call.name, deps = call.deps.len(), "define observed");

        let args = self.rewrite_factory(args, &call);

        let after = match &call.name {
            Some(name) => {
                let record = Job::RecordDefine {
                    name: name.clone(),
                    deps: call.deps.clone(),
                    object_body: call.body.is_object(),
                };
                if !self.queue.push(record) {
                    tracing::warn!(module = %name, "deferred define recording unavailable");
                }
                Some(Job::MarkInitialized { name: name.clone() })
            }
            // Anonymous modules have no node to attribute the edges to.
            None => None,
        };

        ObservedDefine { args, after }
    }

    /// Replaces the factory argument with a [`RecordingFactory`] when any
    /// declared dependency names an import facade. Positions are computed
    /// against the raw declared list, matching how the loader resolves
    /// factory arguments.
    fn rewrite_factory(&self, args: Vec<DefineArg>, call: &DefineCall) -> Vec<DefineArg> {
        let DefineBody::Factory(inner) = &call.body else {
            return args;
        };
        let facade_positions: Vec<usize> = call
            .deps
            .iter()
            .enumerate()
            .filter(|(_, dep)| is_import_facade(dep))
            .map(|(position, _)| position)
            .collect();
        if facade_positions.is_empty() {
            return args;
        }

        let wrapped: Arc<dyn FactoryLike> = Arc::new(RecordingFactory {
            inner: Arc::clone(inner),
            owner: call.name.clone(),
            facade_positions,
            writer: self.writer.clone(),
        });
        args.into_iter()
            .map(|arg| match arg {
                DefineArg::Factory(_) => DefineArg::Factory(Arc::clone(&wrapped)),
                other => other,
            })
            .collect()
    }
}

// ==================
// Factory Wrapping
// ==================

/// Factory that wraps facade-position imports before running the real
/// body. Imports at every other position pass through untouched.
pub(crate) struct RecordingFactory {
    inner: Arc<dyn FactoryLike>,
    owner: Option<String>,
    facade_positions: Vec<usize>,
    writer: GraphWriter,
}

impl FactoryLike for RecordingFactory {
    fn invoke(&self, mut imports: Vec<FactoryImport>) -> LoaderResult<Value> {
        for &position in &self.facade_positions {
            let Some(FactoryImport::Facade(facade)) = imports.get(position) else {
                continue;
            };
            let recording: Arc<dyn ImportFacade> = Arc::new(RecordingFacade {
                inner: Arc::clone(facade),
                owner: self.owner.clone(),
                writer: self.writer.clone(),
            });
            imports[position] = FactoryImport::Facade(recording);
        }
        self.inner.invoke(imports)
    }
}

/// Import facade that records a dynamic edge from the owning module for
/// every load request, then delegates.
pub(crate) struct RecordingFacade {
    inner: Arc<dyn ImportFacade>,
    owner: Option<String>,
    writer: GraphWriter,
}

impl ImportFacade for RecordingFacade {
    fn load(&self, targets: &[String]) -> LoaderResult<()> {
        self.writer.record_require(self.owner.as_deref(), targets);
        self.inner.load(targets)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
