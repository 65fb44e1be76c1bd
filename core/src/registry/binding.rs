//! # BINDING STORE
//!
//! Per-scope map from [`Key`] to a value-producing strategy, plus the cache of
//! factory products resolved *by this scope*.

use crate::registry::key::Key;
use crate::registry::scope::Registry;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-erased shared instance held by a scope.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Constructor invoked with the scope that requested the value.
pub type ProviderFn = Arc<dyn Fn(&Registry) -> AnyArc + Send + Sync>;

/// **BINDING KINDS**
#[derive(Clone)]
pub enum Binding {
    /// Already constructed, returned verbatim on every lookup.
    Value(AnyArc),
    /// Invoked lazily, memoized in the requesting scope.
    Factory(ProviderFn),
    /// Invoked on every lookup, never cached.
    Initializer(ProviderFn),
}

impl Binding {
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Value(_) => "value",
            Binding::Factory(_) => "factory",
            Binding::Initializer(_) => "initializer",
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// **BINDING STORE**
///
/// **GUARANTEE**: Locks are never held while a provider runs, so providers may
/// resolve other keys from the scope they are handed.
#[derive(Default)]
pub struct BindingStore {
    bindings: RwLock<HashMap<Key, Binding>>,
    cache: Mutex<HashMap<Key, Cached>>,
}

/// Factory product together with the provider that built it.
pub(crate) struct Cached {
    value: AnyArc,
    origin: ProviderFn,
}

impl Cached {
    fn built_by(&self, provider: &ProviderFn) -> bool {
        same_provider(&self.origin, provider)
    }
}

fn same_provider(a: &ProviderFn, b: &ProviderFn) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `binding` under `key`, replacing any previous one (last write wins).
    ///
    /// A factory product this store cached for `key` is evicted so the new
    /// binding takes effect on the next lookup.
    pub fn bind(&self, key: Key, binding: Binding) {
        let evicted = self.cache.lock().remove(&key);
        let replaced = self.bindings.write().insert(key, binding);
        drop((evicted, replaced));
    }

    /// Whether this store itself defines `key`; ancestors are not consulted.
    pub fn contains(&self, key: &Key) -> bool {
        self.bindings.read().contains_key(key)
    }

    pub fn binding(&self, key: &Key) -> Option<Binding> {
        self.bindings.read().get(key).cloned()
    }

    pub fn cached(&self, key: &Key) -> Option<AnyArc> {
        self.cache.lock().get(key).map(|entry| entry.value.clone())
    }

    /// Satisfies `key` from this store alone.
    ///
    /// Returns `None` when the store has no binding for `key`.
    pub fn local_lookup(&self, key: &Key, scope: &Registry) -> Option<AnyArc> {
        let binding = self.binding(key)?;
        Some(self.materialize(key, binding, scope))
    }

    /// Produces a value for `binding` on behalf of `scope`, the owner of this
    /// store, caching factory products here.
    ///
    /// A cached product only counts when `binding` is the factory that built
    /// it; after a rebind anywhere up the tree the stale product is replaced.
    pub(crate) fn materialize(&self, key: &Key, binding: Binding, scope: &Registry) -> AnyArc {
        let factory = match binding {
            Binding::Value(value) => return value,
            Binding::Initializer(init) => return init(scope),
            Binding::Factory(factory) => factory,
        };

        if let Some(hit) = self
            .cache
            .lock()
            .get(key)
            .filter(|entry| entry.built_by(&factory))
        {
            return hit.value.clone();
        }

        let produced = factory(scope);
        let mut cache = self.cache.lock();
        // Disposal flips the state before draining under this lock.
        if scope.is_disposed() {
            return produced;
        }
        match cache.get(key) {
            // A concurrent resolution won the race; every caller observes its product.
            Some(entry) if entry.built_by(&factory) => entry.value.clone(),
            _ => {
                let stale = cache.insert(
                    key.clone(),
                    Cached {
                        value: produced.clone(),
                        origin: factory,
                    },
                );
                drop(cache);
                drop(stale);
                produced
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Key> {
        self.bindings.read().keys().cloned().collect()
    }

    /// Empties the store, handing the contents back so they are dropped
    /// outside the locks.
    pub(crate) fn drain(&self) -> (HashMap<Key, Binding>, HashMap<Key, Cached>) {
        let cache = std::mem::take(&mut *self.cache.lock());
        let bindings = std::mem::take(&mut *self.bindings.write());
        (bindings, cache)
    }
}

impl fmt::Debug for BindingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingStore")
            .field("bindings", &self.len())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_provider(counter: Arc<AtomicUsize>) -> ProviderFn {
        Arc::new(move |_scope: &Registry| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(n) as AnyArc
        })
    }

    #[test]
    fn test_value_returned_verbatim() {
        let scope = Registry::new();
        let store = BindingStore::new();
        let value: AnyArc = Arc::new(7u32);
        store.bind(Key::of::<u32>(), Binding::Value(value.clone()));

        let found = store.local_lookup(&Key::of::<u32>(), &scope).unwrap();
        assert!(Arc::ptr_eq(&found, &value));
    }

    #[test]
    fn test_factory_runs_once() {
        let scope = Registry::new();
        let store = BindingStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        store.bind(Key::of::<usize>(), Binding::Factory(counting_provider(calls.clone())));

        let a = store.local_lookup(&Key::of::<usize>(), &scope).unwrap();
        let b = store.local_lookup(&Key::of::<usize>(), &scope).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initializer_runs_every_time() {
        let scope = Registry::new();
        let store = BindingStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        store.bind(Key::of::<usize>(), Binding::Initializer(counting_provider(calls.clone())));

        store.local_lookup(&Key::of::<usize>(), &scope).unwrap();
        store.local_lookup(&Key::of::<usize>(), &scope).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.cached(&Key::of::<usize>()).is_none());
    }

    #[test]
    fn test_rebind_overwrites_and_evicts_cache() {
        let scope = Registry::new();
        let store = BindingStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = Key::of::<usize>();
        store.bind(key.clone(), Binding::Factory(counting_provider(calls)));
        store.local_lookup(&key, &scope).unwrap();
        assert!(store.cached(&key).is_some());

        store.bind(key.clone(), Binding::Value(Arc::new(99usize)));
        assert!(store.cached(&key).is_none());
        let found = store.local_lookup(&key, &scope).unwrap();
        assert_eq!(*found.downcast::<usize>().unwrap(), 99);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cached_product_ignored_for_other_factory() {
        let scope = Registry::new();
        let store = BindingStore::new();
        let key = Key::of::<usize>();
        let first = counting_provider(Arc::new(AtomicUsize::new(10)));
        let second = counting_provider(Arc::new(AtomicUsize::new(20)));

        let a = store.materialize(&key, Binding::Factory(first.clone()), &scope);
        let b = store.materialize(&key, Binding::Factory(second), &scope);
        assert_eq!(*a.downcast::<usize>().unwrap(), 10);
        assert_eq!(*b.clone().downcast::<usize>().unwrap(), 20);
        assert!(store.cached(&key).is_some_and(|hit| Arc::ptr_eq(&hit, &b)));

        let c = store.materialize(&key, Binding::Factory(first), &scope);
        assert_eq!(*c.downcast::<usize>().unwrap(), 11);
    }

    #[test]
    fn test_disposed_scope_caches_nothing() {
        let scope = Registry::new();
        let store = BindingStore::new();
        let key = Key::of::<usize>();
        let calls = Arc::new(AtomicUsize::new(0));
        scope.must_dispose();

        let produced = store.materialize(&key, Binding::Factory(counting_provider(calls.clone())), &scope);
        assert_eq!(*produced.downcast::<usize>().unwrap(), 0);
        assert!(store.cached(&key).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_key() {
        let scope = Registry::new();
        let store = BindingStore::new();
        assert!(store.local_lookup(&Key::of::<u8>(), &scope).is_none());
        assert!(store.is_empty());
    }
}
