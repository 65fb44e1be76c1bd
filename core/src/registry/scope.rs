//! # REGISTRY SCOPE
//!
//! **ARCHITECTURE**: Scopes form a strict tree. Each scope owns a
//! [`BindingStore`], a link to its parent and a live-child counter; lookups
//! fall back to ancestors, never the other way round.
//!
//! **GUARANTEE**: A scope cannot be disposed while any of its children is
//! still live, and a disposed scope cannot be forked.

use crate::errors::{CoreError, CoreResult};
use crate::registry::autowire::Autowire;
use crate::registry::binding::{AnyArc, Binding, BindingStore};
use crate::registry::disposer::{Dispose, DisposerStack};
use crate::registry::key::Key;
use parking_lot::RwLock;
use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// High bit of the scope state; the remaining bits count live children.
const DISPOSED: usize = 1 << (usize::BITS - 1);

struct ScopeInner {
    id: u64,
    depth: usize,
    parent: RwLock<Option<Registry>>,
    store: BindingStore,
    disposers: DisposerStack,
    state: AtomicUsize,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let state = self.state.load(Ordering::SeqCst);
        if state & DISPOSED == 0 && self.parent.get_mut().is_some() {
            log::warn!(
                "scope #{} dropped without dispose; its parent still counts it as live",
                self.id
            );
        }
    }
}

/// **HIERARCHICAL TYPED-VALUE REGISTRY**
///
/// Cheap to clone: every clone is a handle to the same scope. Handles are
/// `Send + Sync`, so one parent may be forked concurrently from many workers.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<ScopeInner>,
}

impl Registry {
    /// Creates a root scope.
    pub fn new() -> Self {
        Self::with_parent(None, 0)
    }

    fn with_parent(parent: Option<Registry>, depth: usize) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed),
                depth,
                parent: RwLock::new(parent),
                store: BindingStore::new(),
                disposers: DisposerStack::default(),
                state: AtomicUsize::new(0),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Distance from the root scope.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.load(Ordering::SeqCst) & DISPOSED != 0
    }

    /// Children forked from this scope and not yet disposed.
    pub fn live_children(&self) -> usize {
        self.inner.state.load(Ordering::SeqCst) & !DISPOSED
    }

    /// Whether both handles point at the same scope.
    pub fn same_scope(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ============================================================================================
    // FORKING
    // ============================================================================================

    /// Creates a child scope layered on top of this one.
    ///
    /// # Panics
    ///
    /// Forking a disposed scope is a lifecycle violation and panics; use
    /// [`Registry::try_fork`] to observe it as an error instead.
    pub fn fork(&self) -> Registry {
        match self.try_fork() {
            Ok(child) => child,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_fork(&self) -> CoreResult<Registry> {
        self.inner
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                if state & DISPOSED != 0 {
                    None
                } else {
                    Some(state + 1)
                }
            })
            .map_err(|_| CoreError::Disposed { scope: self.id() })?;

        let child = Self::with_parent(Some(self.clone()), self.depth() + 1);

        #[cfg(debug_assertions)]
        log::debug!("scope #{} forked from #{}", child.id(), self.id());

        Ok(child)
    }

    // ============================================================================================
    // BINDING
    // ============================================================================================

    /// Registers a raw binding. Overwrites silently: the last registration wins.
    pub fn bind(&self, key: Key, binding: Binding) {
        #[cfg(debug_assertions)]
        log::debug!("scope #{}: binding {} as {}", self.id(), key, binding.kind());

        self.inner.store.bind(key, binding);
    }

    pub fn bind_value<T: Send + Sync + 'static>(&self, value: T) {
        self.bind(Key::of::<T>(), Binding::Value(Arc::new(value)));
    }

    pub fn bind_value_named<T: Send + Sync + 'static>(
        &self,
        name: impl Into<Cow<'static, str>>,
        value: T,
    ) {
        self.bind(Key::named::<T>(name), Binding::Value(Arc::new(value)));
    }

    /// Binds an already shared instance; resolving yields the same `Arc`.
    pub fn bind_arc<T: Send + Sync + 'static>(&self, value: Arc<T>) {
        self.bind(Key::of::<T>(), Binding::Value(value));
    }

    /// Binds a provider whose product is memoized per requesting scope.
    pub fn bind_factory<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        self.bind(Key::of::<T>(), Binding::Factory(erase(factory)));
    }

    pub fn bind_factory_named<T, F>(&self, name: impl Into<Cow<'static, str>>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        self.bind(Key::named::<T>(name), Binding::Factory(erase(factory)));
    }

    /// Binds a provider invoked on every lookup.
    pub fn bind_initializer<T, F>(&self, initializer: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        self.bind(Key::of::<T>(), Binding::Initializer(erase(initializer)));
    }

    pub fn bind_initializer_named<T, F>(&self, name: impl Into<Cow<'static, str>>, initializer: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        self.bind(Key::named::<T>(name), Binding::Initializer(erase(initializer)));
    }

    /// Whether this scope defines `key` itself.
    pub fn contains_local(&self, key: &Key) -> bool {
        self.inner.store.contains(key)
    }

    /// Whether this scope or any ancestor defines `key`.
    pub fn contains(&self, key: &Key) -> bool {
        self.find_binding(key).is_some()
    }

    // ============================================================================================
    // RESOLUTION
    // ============================================================================================

    /// Resolves `key` bottom-up: local store first, then each ancestor.
    ///
    /// Factory products are cached in `self`, whichever scope holds the binding,
    /// and are rebuilt once that binding is replaced.
    pub fn lookup(&self, key: &Key) -> CoreResult<AnyArc> {
        if self.is_disposed() {
            return Err(CoreError::Disposed { scope: self.id() });
        }
        match self.find_binding(key) {
            Some(binding) => Ok(self.inner.store.materialize(key, binding, self)),
            None => Err(CoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    fn find_binding(&self, key: &Key) -> Option<Binding> {
        if let Some(binding) = self.inner.store.binding(key) {
            return Some(binding);
        }
        let parent = self.inner.parent.read();
        parent.as_ref().and_then(|p| p.find_binding(key))
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> CoreResult<Arc<T>> {
        self.resolve_key(&Key::of::<T>())
    }

    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> CoreResult<Arc<T>> {
        self.resolve_key(&Key::named::<T>(name))
    }

    pub fn resolve_key<T: Send + Sync + 'static>(&self, key: &Key) -> CoreResult<Arc<T>> {
        self.lookup(key)?
            .downcast::<T>()
            .map_err(|_| CoreError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Optional dependency: `None` when nothing resolves.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    // ============================================================================================
    // INJECTION
    // ============================================================================================

    pub fn autowire<A: Autowire + ?Sized>(&self, target: &mut A) {
        target.autowire(self);
    }

    /// Fills `slot` when `T` resolves; leaves it untouched otherwise.
    pub fn inject<T: Send + Sync + 'static>(&self, slot: &mut Option<Arc<T>>) -> bool {
        match self.resolve::<T>() {
            Ok(value) => {
                *slot = Some(value);
                true
            }
            Err(_) => false,
        }
    }

    // ============================================================================================
    // TEARDOWN
    // ============================================================================================

    /// Runs `hook` when this scope is disposed.
    pub fn defer<F: FnOnce() + Send + 'static>(&self, hook: F) {
        self.inner.disposers.push(Box::new(hook));
    }

    /// Disposes `resource` together with this scope.
    pub fn track<T: Dispose + 'static>(&self, resource: Arc<T>) {
        self.inner.disposers.track(resource);
    }

    /// Releases this scope.
    ///
    /// Fails with `DisposeWithLiveChildren` (nothing released, parent untouched)
    /// while children are live, and with `Disposed` on a second call.
    /// On success, teardown hooks run newest first, bindings and cached
    /// products are dropped, the parent's live-child count is decremented, and
    /// the number of *other* handles still pointing at this scope is returned.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from a teardown hook once the scope is fully released.
    pub fn dispose(&self) -> CoreResult<usize> {
        if let Err(state) =
            self.inner
                .state
                .compare_exchange(0, DISPOSED, Ordering::SeqCst, Ordering::SeqCst)
        {
            return Err(if state & DISPOSED != 0 {
                CoreError::Disposed { scope: self.id() }
            } else {
                CoreError::DisposeWithLiveChildren {
                    scope: self.id(),
                    children: state,
                }
            });
        }

        // A panicking hook must not strand the parent's live-child count.
        let hooks = panic::catch_unwind(AssertUnwindSafe(|| self.inner.disposers.run()));
        drop(self.inner.store.drain());

        let parent = self.inner.parent.write().take();
        if let Some(parent) = parent {
            parent.inner.state.fetch_sub(1, Ordering::SeqCst);
        }

        let hooks = match hooks {
            Ok(hooks) => hooks,
            Err(payload) => {
                log::error!("teardown hook of scope #{} panicked; scope released", self.id());
                panic::resume_unwind(payload)
            }
        };
        let outstanding = Arc::strong_count(&self.inner).saturating_sub(1);

        #[cfg(debug_assertions)]
        log::debug!(
            "scope #{} disposed ({} hook(s), {} outstanding reference(s))",
            self.id(),
            hooks,
            outstanding
        );
        #[cfg(not(debug_assertions))]
        let _ = hooks;

        Ok(outstanding)
    }

    /// Disposes and requires a clean release.
    ///
    /// # Panics
    ///
    /// When the scope still has live children, was already disposed, or other
    /// handles to it remain.
    pub fn must_dispose(&self) {
        match self.dispose() {
            Ok(0) => {}
            Ok(outstanding) => {
                log::error!(
                    "scope #{} leaked: {} outstanding reference(s) after dispose",
                    self.id(),
                    outstanding
                );
                panic!(
                    "scope #{} disposed with {} outstanding reference(s)",
                    self.id(),
                    outstanding
                );
            }
            Err(err) => {
                log::error!("{}", err);
                panic!("{}", err);
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id())
            .field("depth", &self.depth())
            .field("live_children", &self.live_children())
            .field("disposed", &self.is_disposed())
            .field("store", &self.inner.store)
            .finish()
    }
}

fn erase<T, F>(provider: F) -> crate::registry::binding::ProviderFn
where
    T: Send + Sync + 'static,
    F: Fn(&Registry) -> T + Send + Sync + 'static,
{
    Arc::new(move |scope: &Registry| Arc::new(provider(scope)) as AnyArc)
}
