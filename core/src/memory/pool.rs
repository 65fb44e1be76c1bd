//! Typed object pool with a strict reset discipline

use parking_lot::Mutex;
use std::fmt;

/// Returns an object to its zero state before it is pooled or reused.
pub trait Reset {
    fn reset(&mut self);
}

/// Pool of reusable boxed objects of a single type.
///
/// Objects are reset both when released and when handed out, so nothing set
/// during one use can be observed by the next.
pub struct ObjectPool<T> {
    capacity: usize,
    idle: Mutex<Vec<Box<T>>>,
}

impl<T: Reset + Default> ObjectPool<T> {
    /// Create a pool retaining at most *capacity* idle objects.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take a reset object from the pool, or build a fresh one.
    pub fn acquire(&self) -> Box<T> {
        let reused = self.idle.lock().pop();
        match reused {
            Some(mut object) => {
                object.reset();
                object
            }
            None => Box::default(),
        }
    }

    /// Reset *object* and keep it for reuse unless the pool is full.
    pub fn release(&self, mut object: Box<T>) {
        object.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(object);
        }
    }

    /// Number of idle objects ready for reuse.
    pub fn available(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("type", &std::any::type_name::<T>())
            .field("capacity", &self.capacity)
            .field("idle", &self.idle.lock().len())
            .finish()
    }
}
