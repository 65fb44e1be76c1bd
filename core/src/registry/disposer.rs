//! Teardown hooks attached to a scope and the bundle helpers used to release
//! groups of resources.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Resource released when its owning scope is disposed.
pub trait Dispose: Send + Sync {
    fn dispose(&self);
}

/// Resource with a fallible close.
pub trait Close {
    fn close(&self) -> Result<(), String>;
}

/// Resource with a fallible cancel.
pub trait Cancel {
    fn cancel(&self) -> Result<(), String>;
}

/// Disposes every present entry.
pub fn dispose_all(disposers: &[Option<&dyn Dispose>]) {
    for disposer in disposers.iter().flatten() {
        disposer.dispose();
    }
}

/// Closes every present entry; failures are logged and skipped.
pub fn close_all(closers: &[Option<&dyn Close>]) {
    for closer in closers.iter().flatten() {
        if let Err(err) = closer.close() {
            log::warn!("close failed during teardown: {}", err);
        }
    }
}

/// Cancels every present entry; failures are logged and skipped.
pub fn cancel_all(cancelables: &[Option<&dyn Cancel>]) {
    for cancelable in cancelables.iter().flatten() {
        if let Err(err) = cancelable.cancel() {
            log::warn!("cancel failed during teardown: {}", err);
        }
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// **TEARDOWN STACK**
///
/// **GUARANTEE**: Hooks run at most once, newest first.
#[derive(Default)]
pub(crate) struct DisposerStack {
    hooks: Mutex<Vec<Hook>>,
}

impl DisposerStack {
    pub(crate) fn push(&self, hook: Hook) {
        self.hooks.lock().push(hook);
    }

    pub(crate) fn track<T: Dispose + 'static>(&self, resource: Arc<T>) {
        self.push(Box::new(move || resource.dispose()));
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Runs and forgets every registered hook.
    pub(crate) fn run(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let count = hooks.len();
        for hook in hooks.into_iter().rev() {
            hook();
        }
        count
    }
}

impl fmt::Debug for DisposerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposerStack").field("hooks", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flag(AtomicUsize);

    impl Dispose for Flag {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingCloser;

    impl Close for FailingCloser {
        fn close(&self) -> Result<(), String> {
            Err("socket already closed".into())
        }
    }

    struct CountingCanceler(AtomicUsize);

    impl Cancel for CountingCanceler {
        fn cancel(&self) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_hooks_run_newest_first_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stack = DisposerStack::default();
        for i in 0..3 {
            let order = order.clone();
            stack.push(Box::new(move || order.lock().push(i)));
        }

        assert_eq!(stack.run(), 3);
        assert_eq!(stack.run(), 0);
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn test_track_disposes_resource() {
        let flag = Arc::new(Flag(AtomicUsize::new(0)));
        let stack = DisposerStack::default();
        stack.track(flag.clone());
        stack.run();
        assert_eq!(flag.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bundles_skip_missing_and_failures() {
        let flag = Flag(AtomicUsize::new(0));
        dispose_all(&[None, Some(&flag), Some(&flag)]);
        assert_eq!(flag.0.load(Ordering::SeqCst), 2);

        close_all(&[Some(&FailingCloser), None]);

        let canceler = CountingCanceler(AtomicUsize::new(0));
        cancel_all(&[Some(&canceler), None, Some(&canceler)]);
        assert_eq!(canceler.0.load(Ordering::SeqCst), 2);
    }
}
