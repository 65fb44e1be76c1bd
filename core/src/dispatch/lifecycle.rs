//! # REQUEST LIFECYCLE
//!
//! **ARCHITECTURE**: Fork a request scope, bind a pooled [`Context`] to it,
//! run the chain, then release. Release happens on every exit path, a handler
//! panic included, and always in the same order: detach the scope, reset the
//! context, return it to the pool, dispose the scope.

use crate::dispatch::context::Context;
use crate::dispatch::handler::Chain;
use crate::errors::CoreResult;
use crate::memory::{ObjectPool, Reset};
use crate::registry::Registry;
use crate::request::{Request, RouteParams};
use crate::response::Response;
use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::watch;

/// Installs `chain` on `ctx` and runs its first handler.
pub fn dispatch(ctx: &mut Context, chain: Chain) -> CoreResult<()> {
    ctx.install_chain(chain);
    ctx.next()
}

/// How a request scope that does not release cleanly is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Teardown {
    /// Leaked handles or live children abort the request with a panic.
    #[default]
    Strict,
    /// Leaks are logged; a failed disposal is returned as an error.
    Lenient,
}

/// Pooled contexts plus the teardown policy applied on release.
#[derive(Debug)]
pub struct Lifecycle {
    pool: ObjectPool<Context>,
    teardown: Teardown,
}

impl Lifecycle {
    pub fn new(pool_capacity: usize, teardown: Teardown) -> Self {
        Self {
            pool: ObjectPool::new(pool_capacity),
            teardown,
        }
    }

    pub fn teardown(&self) -> Teardown {
        self.teardown
    }

    /// Idle contexts ready for reuse.
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    /// A zeroed context, recycled when one is idle.
    pub fn acquire(&self) -> Box<Context> {
        self.pool.acquire()
    }

    /// Returns `ctx` to the pool and disposes the scope it was bound to.
    ///
    /// # Panics
    ///
    /// Under [`Teardown::Strict`] when the scope still has live children or
    /// outstanding handles.
    pub fn release(&self, mut ctx: Box<Context>) -> CoreResult<()> {
        let scope = ctx.take_registry();
        ctx.reset();
        self.pool.release(ctx);

        let Some(scope) = scope else {
            return Ok(());
        };
        match self.teardown {
            Teardown::Strict => {
                scope.must_dispose();
                Ok(())
            }
            Teardown::Lenient => match scope.dispose() {
                Ok(0) => Ok(()),
                Ok(outstanding) => {
                    log::warn!(
                        "request scope #{} released with {} outstanding reference(s)",
                        scope.id(),
                        outstanding
                    );
                    Ok(())
                }
                Err(err) => {
                    log::error!("request scope #{} failed to release: {}", scope.id(), err);
                    Err(err)
                }
            },
        }
    }

    /// Serves one request in a fresh child of `parent`.
    ///
    /// A handler panic is re-raised only after the context and the request
    /// scope have been released.
    pub fn run(
        &self,
        parent: &Registry,
        name: &str,
        request: Request,
        params: RouteParams,
        cancel: Option<watch::Receiver<bool>>,
        chain: Chain,
    ) -> CoreResult<Response> {
        let scope = parent.try_fork()?;
        let mut ctx = self.acquire();
        ctx.install(name, scope, request, params, cancel);

        #[cfg(debug_assertions)]
        log::debug!("dispatching '{}' through {} handler(s)", name, chain.len());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(&mut ctx, chain)));
        let response = mem::take(&mut ctx.response);
        let released = self.release(ctx);

        match (outcome, released) {
            (Ok(result), released) => {
                released?;
                result.map(|()| response)
            }
            (Err(payload), Ok(())) => {
                log::error!(
                    "handler panicked in '{}': {}; request scope released",
                    name,
                    panic_message(payload.as_ref())
                );
                panic::resume_unwind(payload)
            }
            (Err(payload), Err(err)) => {
                let message = panic_message(payload.as_ref()).to_string();
                log::error!("handler panicked in '{}': {}; then {}", name, message, err);
                panic!("{} (after handler panic: {})", err, message)
            }
        }
    }
}

/// Text of a recovered panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_POOL_CAPACITY, Teardown::Strict)
    }
}
