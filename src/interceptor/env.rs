//! Hook slots and the interception state machine.
//!
//! The page environment owns one slot per global loader hook. The page
//! (or the loader bootstrapping itself) assigns callables into the slots;
//! host code calls through them. Each slot runs the target-loader
//! identity check on assignment and, once the interceptor has installed
//! its recording hook, wraps calls whenever the slot is intercepted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock, Weak};

use super::define::DefineArg;
use super::errors::{LoaderError, LoaderResult};
use super::wrappers::{DefineHook, RequireHook};

/// Callable assigned into the page's require hook.
pub trait RequireLike: Send + Sync {
    fn call(&self, context: Option<&str>, targets: &[String]) -> LoaderResult<()>;
    /// Whether this callable belongs to the loader being tracked.
    fn is_target_loader(&self) -> bool;
}

/// Callable assigned into the page's define hook.
pub trait DefineLike: Send + Sync {
    fn call(&self, args: Vec<DefineArg>) -> LoaderResult<()>;
    fn is_target_loader(&self) -> bool;
}

/// Observable stage of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// No callable assigned yet
    Unset,
    /// A callable is assigned but failed the target-loader identity check
    Passthrough,
    /// The target loader's callable is assigned; calls are wrapped
    Intercepted,
}

enum Disposition<T: ?Sized> {
    Unset,
    Passthrough(Arc<T>),
    Intercepted(Arc<T>),
}

impl<T: ?Sized> Disposition<T> {
    fn state(&self) -> HookState {
        match self {
            Disposition::Unset => HookState::Unset,
            Disposition::Passthrough(_) => HookState::Passthrough,
            Disposition::Intercepted(_) => HookState::Intercepted,
        }
    }

    fn resolve(&self) -> Option<(Arc<T>, bool)> {
        match self {
            Disposition::Unset => None,
            Disposition::Passthrough(callable) => Some((Arc::clone(callable), false)),
            Disposition::Intercepted(callable) => Some((Arc::clone(callable), true)),
        }
    }
}

/// Page environment handing out its loader hook slots.
pub trait LoaderEnv {
    fn require_slot(&self) -> Arc<RequireSlot>;
    fn define_slot(&self) -> Arc<DefineSlot>;
}

// ==================
// Require Hook
// ==================

/// Slot for the global require hook.
pub struct RequireSlot {
    inner: RwLock<Disposition<dyn RequireLike>>,
    hook: OnceLock<RequireHook>,
    marker: OnceLock<Arc<MarkerCell>>,
}

impl RequireSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Disposition::Unset),
            hook: OnceLock::new(),
            marker: OnceLock::new(),
        })
    }

    pub(crate) fn install(&self, hook: RequireHook) -> LoaderResult<()> {
        self.hook
            .set(hook)
            .map_err(|_| LoaderError::AlreadyInstalled)
    }

    /// Assigns a callable, classifying it by the identity check or an
    /// already-set marker.
    pub fn assign(&self, callable: Arc<dyn RequireLike>) {
        let marked = self.marker.get().map(|m| m.get()).unwrap_or(false);
        let disposition = if callable.is_target_loader() || marked {
            Disposition::Intercepted(callable)
        } else {
            Disposition::Passthrough(callable)
        };
        *self.inner.write().unwrap() = disposition;
        tracing::debug!(state = ?self.state(), "require hook assigned");
    }

    /// The loader identity marker for this hook, created on first access.
    pub fn marker(self: &Arc<Self>) -> Arc<MarkerCell> {
        Arc::clone(self.marker.get_or_init(|| {
            Arc::new(MarkerCell {
                value: AtomicBool::new(false),
                owner: Arc::downgrade(self),
            })
        }))
    }

    pub fn state(&self) -> HookState {
        self.inner.read().unwrap().state()
    }

    /// Calls through the hook as page code would. When intercepted, the
    /// dynamic edges are recorded before the call is delegated.
    pub fn invoke(&self, context: Option<&str>, targets: &[String]) -> LoaderResult<()> {
        let (callable, intercepted) = self
            .inner
            .read()
            .unwrap()
            .resolve()
            .ok_or(LoaderError::HookUnset("require"))?;
        if intercepted {
            if let Some(hook) = self.hook.get() {
                hook.observe(context, targets);
            }
        }
        callable.call(context, targets)
    }

    /// Re-runs classification after the marker flipped. Upgrade only;
    /// an intercepted hook never drops back to passthrough.
    fn reconsider(&self) {
        let mut slot = self.inner.write().unwrap();
        if let Disposition::Passthrough(callable) = &*slot {
            let callable = Arc::clone(callable);
            tracing::debug!("require hook retroactively intercepted");
            *slot = Disposition::Intercepted(callable);
        }
    }
}

/// Identity marker the loader flips once it has finished bootstrapping.
///
/// The loader sometimes assigns its require before initializing the
/// marker, so setting it true retroactively upgrades an already-assigned
/// passthrough hook.
pub struct MarkerCell {
    value: AtomicBool,
    owner: Weak<RequireSlot>,
}

impl MarkerCell {
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::SeqCst);
        if value {
            if let Some(owner) = self.owner.upgrade() {
                owner.reconsider();
            }
        }
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::SeqCst)
    }
}

// ==================
// Define Hook
// ==================

/// Slot for the global define hook.
pub struct DefineSlot {
    inner: RwLock<Disposition<dyn DefineLike>>,
    hook: OnceLock<DefineHook>,
}

impl DefineSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Disposition::Unset),
            hook: OnceLock::new(),
        })
    }

    pub(crate) fn install(&self, hook: DefineHook) -> LoaderResult<()> {
        self.hook
            .set(hook)
            .map_err(|_| LoaderError::AlreadyInstalled)
    }

    pub fn assign(&self, callable: Arc<dyn DefineLike>) {
        let disposition = if callable.is_target_loader() {
            Disposition::Intercepted(callable)
        } else {
            Disposition::Passthrough(callable)
        };
        *self.inner.write().unwrap() = disposition;
        tracing::debug!(state = ?self.state(), "define hook assigned");
    }

    pub fn state(&self) -> HookState {
        self.inner.read().unwrap().state()
    }

    /// Calls through the hook as page code would. When intercepted, the
    /// call is classified, its deferred recording queued, facade-bearing
    /// factories wrapped, and the initialized notice scheduled once the
    /// delegated call succeeds.
    pub fn invoke(&self, args: Vec<DefineArg>) -> LoaderResult<()> {
        let (callable, intercepted) = self
            .inner
            .read()
            .unwrap()
            .resolve()
            .ok_or(LoaderError::HookUnset("define"))?;
        let hook = if intercepted { self.hook.get() } else { None };
        let Some(hook) = hook else {
            return callable.call(args);
        };

        let observed = hook.observe(args);
        let result = callable.call(observed.args);
        if result.is_ok() {
            if let Some(job) = observed.after {
                if !hook.queue.push(job) {
                    tracing::warn!("initialized notice dropped, recorder gone");
                }
            }
        }
        result
    }
}
