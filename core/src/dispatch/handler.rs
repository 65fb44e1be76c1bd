use crate::dispatch::context::Context;
use crate::errors::CoreResult;
use std::fmt;
use std::sync::Arc;

/// **REQUEST-PROCESSING UNIT**
///
/// A handler consumes the [`Context`] and may call [`Context::next`] to run
/// the rest of the chain. Returning without calling `next` short-circuits.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &mut Context) -> CoreResult<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> CoreResult<()> + Send + Sync,
{
    fn handle(&self, ctx: &mut Context) -> CoreResult<()> {
        self(ctx)
    }
}

pub type SharedHandler = Arc<dyn Handler>;

/// Immutable, precomputed handler sequence shared by every request of an endpoint.
pub type Chain = Arc<[SharedHandler]>;

/// Boxes a closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> SharedHandler
where
    F: Fn(&mut Context) -> CoreResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// **MIDDLEWARE BUNDLE**
///
/// Ordered middleware prepended to every chain built from it.
#[derive(Clone, Default)]
pub struct MiddlewareBundle {
    handlers: Vec<SharedHandler>,
}

impl MiddlewareBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_middleware<H: Handler + 'static>(&mut self, handler: H) {
        self.handlers.push(Arc::new(handler));
    }

    pub fn add_shared(&mut self, handlers: impl IntoIterator<Item = SharedHandler>) {
        self.handlers.extend(handlers);
    }

    pub fn add_middleware_fn<F>(&mut self, f: F)
    where
        F: Fn(&mut Context) -> CoreResult<()> + Send + Sync + 'static,
    {
        self.handlers.push(handler_fn(f));
    }

    /// Forgets the registered middleware for chains built afterwards.
    pub fn clear_middlewares(&mut self) {
        self.handlers.clear();
    }

    pub fn handlers(&self) -> &[SharedHandler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Bundle middleware followed by `extra`, as a fresh sequence.
    pub fn chain_with(&self, extra: &[SharedHandler]) -> Vec<SharedHandler> {
        let mut handlers = Vec::with_capacity(self.handlers.len() + extra.len());
        handlers.extend(self.handlers.iter().cloned());
        handlers.extend(extra.iter().cloned());
        handlers
    }

    /// Bundle middleware, then `filters`, then the terminal `handler`.
    pub fn build_chain(&self, filters: &[SharedHandler], handler: SharedHandler) -> Chain {
        let mut handlers = self.chain_with(filters);
        handlers.push(handler);
        handlers.into()
    }
}

impl fmt::Debug for MiddlewareBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareBundle")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
