//! Simulated page environment.
//!
//! A [`FakePage`] owns hook slots the way a real page owns its globals,
//! and a [`FakeLoader`] stands in for the third-party loader: it logs
//! every call it receives, optionally runs factories eagerly, and can be
//! told to fail its next call. Used by the test suites and by the CLI
//! trace replay.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::graph::names::is_import_facade;

use super::define::{
    classify, DefineArg, DefineBody, FactoryImport, FactoryLike, ImportFacade,
};
use super::env::{DefineLike, DefineSlot, LoaderEnv, MarkerCell, RequireLike, RequireSlot};
use super::errors::{LoaderError, LoaderResult};

/// One call the fake loader received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCall {
    Require {
        context: Option<String>,
        targets: Vec<String>,
    },
    Define {
        name: Option<String>,
        deps: Vec<String>,
    },
    FacadeLoad {
        facade: String,
        targets: Vec<String>,
    },
}

// ==================
// Fake Page
// ==================

/// Injectable page environment with a slot per loader hook.
pub struct FakePage {
    require: Arc<RequireSlot>,
    define: Arc<DefineSlot>,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            require: RequireSlot::new(),
            define: DefineSlot::new(),
        }
    }

    /// Assigns one loader to both hooks, as the real bootstrap does.
    pub fn assign_loader(&self, loader: Arc<FakeLoader>) {
        self.require.assign(loader.clone());
        self.define.assign(loader);
    }

    pub fn assign_require(&self, callable: Arc<dyn RequireLike>) {
        self.require.assign(callable);
    }

    pub fn assign_define(&self, callable: Arc<dyn DefineLike>) {
        self.define.assign(callable);
    }

    /// Page code calling the global require.
    pub fn call_require(&self, context: Option<&str>, targets: &[&str]) -> LoaderResult<()> {
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        self.require.invoke(context, &targets)
    }

    /// Page code calling the global define.
    pub fn call_define(&self, args: Vec<DefineArg>) -> LoaderResult<()> {
        self.define.invoke(args)
    }

    pub fn require_marker(&self) -> Arc<MarkerCell> {
        self.require.marker()
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderEnv for FakePage {
    fn require_slot(&self) -> Arc<RequireSlot> {
        Arc::clone(&self.require)
    }

    fn define_slot(&self) -> Arc<DefineSlot> {
        Arc::clone(&self.define)
    }
}

// ==================
// Fake Loader
// ==================

/// Scripted stand-in for the page's module loader.
pub struct FakeLoader {
    authentic: bool,
    eager: bool,
    log: Arc<Mutex<Vec<LoaderCall>>>,
    fail_next: Mutex<Option<String>>,
}

impl FakeLoader {
    /// A loader that passes the identity check.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            authentic: true,
            eager: false,
            log: Arc::new(Mutex::new(Vec::new())),
            fail_next: Mutex::new(None),
        })
    }

    /// A loader that fails the identity check (some other library).
    pub fn foreign() -> Arc<Self> {
        Arc::new(Self {
            authentic: false,
            eager: false,
            log: Arc::new(Mutex::new(Vec::new())),
            fail_next: Mutex::new(None),
        })
    }

    /// An authentic loader that also runs factories during define,
    /// handing facade imports to facade-named dependencies.
    pub fn eager() -> Arc<Self> {
        Arc::new(Self {
            authentic: true,
            eager: true,
            log: Arc::new(Mutex::new(Vec::new())),
            fail_next: Mutex::new(None),
        })
    }

    /// Snapshot of every call received so far.
    pub fn calls(&self) -> Vec<LoaderCall> {
        self.log.lock().unwrap().clone()
    }

    /// Makes the next delegated call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(message.into());
    }

    fn take_failure(&self) -> LoaderResult<()> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(LoaderError::Loader(message));
        }
        Ok(())
    }
}

impl RequireLike for FakeLoader {
    fn call(&self, context: Option<&str>, targets: &[String]) -> LoaderResult<()> {
        self.take_failure()?;
        self.log.lock().unwrap().push(LoaderCall::Require {
            context: context.map(str::to_string),
            targets: targets.to_vec(),
        });
        Ok(())
    }

    fn is_target_loader(&self) -> bool {
        self.authentic
    }
}

impl DefineLike for FakeLoader {
    fn call(&self, args: Vec<DefineArg>) -> LoaderResult<()> {
        self.take_failure()?;

        let call = classify(&args).ok().map(|(_, call)| call);
        let (name, deps) = match &call {
            Some(call) => (call.name.clone(), call.deps.clone()),
            None => (None, Vec::new()),
        };
        self.log
            .lock()
            .unwrap()
            .push(LoaderCall::Define { name, deps });

        if self.eager {
            if let Some(call) = call {
                if let DefineBody::Factory(factory) = &call.body {
                    let imports = call
                        .deps
                        .iter()
                        .map(|dep| {
                            if is_import_facade(dep) {
                                FactoryImport::Facade(Arc::new(LoaderFacade {
                                    name: dep.clone(),
                                    log: Arc::clone(&self.log),
                                })
                                    as Arc<dyn ImportFacade>)
                            } else {
                                FactoryImport::Value(Value::Null)
                            }
                        })
                        .collect();
                    factory.invoke(imports)?;
                }
            }
        }
        Ok(())
    }

    fn is_target_loader(&self) -> bool {
        self.authentic
    }
}

/// Facade the fake loader resolves for facade-named dependencies.
struct LoaderFacade {
    name: String,
    log: Arc<Mutex<Vec<LoaderCall>>>,
}

impl ImportFacade for LoaderFacade {
    fn load(&self, targets: &[String]) -> LoaderResult<()> {
        self.log.lock().unwrap().push(LoaderCall::FacadeLoad {
            facade: self.name.clone(),
            targets: targets.to_vec(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ==================
// Arg Builders
// ==================

/// Factory built from a closure.
pub fn factory<F>(body: F) -> Arc<dyn FactoryLike>
where
    F: Fn(Vec<FactoryImport>) -> LoaderResult<Value> + Send + Sync + 'static,
{
    struct FnFactory<F>(F);
    impl<F> FactoryLike for FnFactory<F>
    where
        F: Fn(Vec<FactoryImport>) -> LoaderResult<Value> + Send + Sync,
    {
        fn invoke(&self, imports: Vec<FactoryImport>) -> LoaderResult<Value> {
            (self.0)(imports)
        }
    }
    Arc::new(FnFactory(body))
}

/// Factory that ignores its imports and yields null.
pub fn noop_factory() -> Arc<dyn FactoryLike> {
    factory(|_| Ok(Value::Null))
}

/// `define(name, deps, factory)` argument vector.
pub fn named_define(name: &str, deps: &[&str], body: Arc<dyn FactoryLike>) -> Vec<DefineArg> {
    vec![
        DefineArg::Text(name.to_string()),
        DefineArg::List(deps.iter().map(|d| d.to_string()).collect()),
        DefineArg::Factory(body),
    ]
}

/// `define(name, deps, data)` argument vector.
pub fn object_define(name: &str, deps: &[&str], value: Value) -> Vec<DefineArg> {
    vec![
        DefineArg::Text(name.to_string()),
        DefineArg::List(deps.iter().map(|d| d.to_string()).collect()),
        DefineArg::Data(value),
    ]
}
