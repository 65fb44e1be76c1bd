//! # EVENT EMITTER BINDING
//!
//! The registry only transports an emitter: it is a Value binding under a
//! well-known key, installed into the root scope by whoever builds the
//! kernel. Publish/subscribe semantics belong to the emitter implementation.

use crate::errors::CoreResult;
use crate::registry::{Binding, Key, Registry};
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Event sink resolvable from any scope.
pub trait Emitter: Send + Sync {
    /// Publishes `event`; returns `true` when a subscriber cancelled it.
    fn emit(&self, scope: &Registry, event: &str, payload: &(dyn Any + Send + Sync)) -> CoreResult<bool>;
}

/// The emitter as stored in the registry.
#[derive(Clone)]
pub struct EmitterHandle(pub Arc<dyn Emitter>);

impl fmt::Debug for EmitterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EmitterHandle")
    }
}

static EMITTER_KEY: Lazy<Key> = Lazy::new(|| Key::named::<EmitterHandle>("scopewire.emitter"));

pub fn emitter_key() -> &'static Key {
    &EMITTER_KEY
}

/// Binds `emitter` in `scope`; descendants without their own emitter inherit it.
pub fn install_emitter(scope: &Registry, emitter: Arc<dyn Emitter>) {
    scope.bind(
        EMITTER_KEY.clone(),
        Binding::Value(Arc::new(EmitterHandle(emitter))),
    );
}

/// The nearest emitter visible from `scope`.
pub fn emitter(scope: &Registry) -> CoreResult<Arc<dyn Emitter>> {
    scope
        .resolve_key::<EmitterHandle>(&EMITTER_KEY)
        .map(|handle| handle.0.clone())
}

pub fn emit(scope: &Registry, event: &str, payload: &(dyn Any + Send + Sync)) -> CoreResult<bool> {
    emitter(scope)?.emit(scope, event, payload)
}

/// Emitter that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmitter;

impl Emitter for NullEmitter {
    fn emit(&self, _scope: &Registry, _event: &str, _payload: &(dyn Any + Send + Sync)) -> CoreResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u64, String)>>,
    }

    impl Emitter for Recorder {
        fn emit(&self, scope: &Registry, event: &str, payload: &(dyn Any + Send + Sync)) -> CoreResult<bool> {
            self.seen.lock().push((scope.id(), event.to_string()));
            Ok(payload.downcast_ref::<&'static str>() == Some(&"cancel"))
        }
    }

    #[test]
    fn test_children_inherit_root_emitter() {
        let recorder = Arc::new(Recorder::default());
        let root = Registry::new();
        install_emitter(&root, recorder.clone());

        let child = root.fork();
        assert!(!emit(&child, "user.created", &"ok").unwrap());
        assert!(emit(&child, "user.deleted", &"cancel").unwrap());

        let seen = recorder.seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (child.id(), "user.created".to_string()));

        child.must_dispose();
    }

    #[test]
    fn test_child_emitter_shadows_parent() {
        let outer = Arc::new(Recorder::default());
        let inner = Arc::new(Recorder::default());
        let root = Registry::new();
        install_emitter(&root, outer.clone());
        let child = root.fork();
        install_emitter(&child, inner.clone());

        emit(&child, "tick", &()).unwrap();
        assert!(outer.seen.lock().is_empty());
        assert_eq!(inner.seen.lock().len(), 1);

        child.must_dispose();
    }

    #[test]
    fn test_missing_emitter_is_not_found() {
        let root = Registry::new();
        assert!(matches!(emit(&root, "tick", &()), Err(CoreError::NotFound { .. })));

        install_emitter(&root, Arc::new(NullEmitter));
        assert!(!emit(&root, "tick", &()).unwrap());
        assert!(root.contains(emitter_key()));
    }
}
