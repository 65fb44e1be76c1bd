//! # KERNEL
//!
//! **ARCHITECTURE**: Owns the root scope, the application middleware and the
//! context pool. Endpoints built from it carry a precomputed chain and fork a
//! request scope per call.
//!
//! **GUARANTEE**: Whatever a handler does, including panicking, the request
//! scope is disposed and the context recycled before a response is returned.

use crate::config::KernelConfig;
use crate::controller::{Controller, Mapper};
use crate::dispatch::{lifecycle, Chain, Handler, Lifecycle, MiddlewareBundle, SharedHandler};
use crate::errors::CoreResult;
use crate::events::{self, Emitter};
use crate::registry::{Autowire, Registry};
use crate::request::{Request, RouteParams};
use crate::response::Response;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;

/// Pluggable unit configured against the kernel at startup.
pub trait Component: Autowire {
    fn bootstrap(&mut self, kernel: &mut Kernel);
}

pub struct Kernel {
    registry: Registry,
    middleware: MiddlewareBundle,
    emitter: Arc<dyn Emitter>,
    lifecycle: Arc<Lifecycle>,
    config: KernelConfig,
    prefix: String,
}

impl Kernel {
    /// Creates a kernel around a fresh root scope with `emitter` installed in it.
    pub fn new(config: KernelConfig, emitter: Arc<dyn Emitter>) -> Self {
        let registry = Registry::new();
        events::install_emitter(&registry, emitter.clone());
        registry.bind_value(config.clone());

        let lifecycle = Arc::new(Lifecycle::new(config.pool_capacity, config.teardown()));

        #[cfg(debug_assertions)]
        log::debug!(
            "kernel created on scope #{} (pool capacity {}, {:?} teardown)",
            registry.id(),
            config.pool_capacity,
            config.teardown()
        );

        Self {
            prefix: config.prefix.clone(),
            registry,
            middleware: MiddlewareBundle::new(),
            emitter,
            lifecycle,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn emitter(&self) -> &Arc<dyn Emitter> {
        &self.emitter
    }

    pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn middleware(&self) -> &MiddlewareBundle {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareBundle {
        &mut self.middleware
    }

    pub fn add_middleware<H: Handler + 'static>(&mut self, handler: H) {
        self.middleware.add_middleware(handler);
    }

    /// Autowires each component from the root scope, then lets it configure
    /// the kernel. A prefix set by one component does not leak into the next.
    pub fn add_components(&mut self, components: &mut [&mut dyn Component]) {
        let prefix = self.prefix.clone();
        for component in components.iter_mut() {
            self.registry.autowire(&mut **component);
            component.bootstrap(self);
            self.prefix.clone_from(&prefix);
        }
    }

    /// A kernel layered on a child scope, sharing pool and emitter, with a
    /// copy of the current middleware.
    pub fn snapshot(&self) -> CoreResult<Kernel> {
        Ok(Self {
            registry: self.registry.try_fork()?,
            middleware: self.middleware.clone(),
            emitter: self.emitter.clone(),
            lifecycle: self.lifecycle.clone(),
            config: self.config.clone(),
            prefix: self.prefix.clone(),
        })
    }

    /// Builds an endpoint: kernel middleware, then `filters`, then `handler`.
    pub fn endpoint<H: Handler + 'static>(
        &self,
        name: &str,
        handler: H,
        filters: &[SharedHandler],
    ) -> Endpoint {
        let chain = self.middleware.build_chain(filters, Arc::new(handler));
        self.endpoint_in(&self.registry, name, chain)
    }

    /// An endpoint whose request scopes fork from `registry`.
    pub fn endpoint_in(&self, registry: &Registry, name: &str, chain: Chain) -> Endpoint {
        Endpoint::new(
            format!("{}{}", self.prefix, name),
            registry,
            chain,
            self.lifecycle.clone(),
        )
    }

    /// Mapper for a controller type, layered on a child of the root scope.
    pub fn controller<C: Controller>(&self) -> CoreResult<Mapper<C>> {
        Mapper::new(self)
    }

    pub fn emit(&self, event: &str, payload: &(dyn Any + Send + Sync)) -> CoreResult<bool> {
        events::emit(&self.registry, event, payload)
    }

    pub fn dispose(&self) -> CoreResult<usize> {
        self.registry.dispose()
    }

    pub fn must_dispose(&self) {
        self.registry.must_dispose();
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("registry", &self.registry)
            .field("middleware", &self.middleware)
            .field("prefix", &self.prefix)
            .field("config", &self.config)
            .finish()
    }
}

/// **REGISTERED HANDLER**
///
/// What the router calls for a matched route. Cheap to clone.
#[derive(Clone)]
pub struct Endpoint {
    name: Arc<str>,
    registry: Registry,
    chain: Chain,
    lifecycle: Arc<Lifecycle>,
}

impl Endpoint {
    pub(crate) fn new(
        name: String,
        registry: &Registry,
        chain: Chain,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            name: name.into(),
            registry: registry.clone(),
            chain,
            lifecycle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handlers in the chain, middleware included.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Serves one request. Errors and handler panics become a 500 response
    /// once the request scope has been released.
    pub fn serve(&self, request: Request, params: RouteParams) -> Response {
        self.serve_with_cancel(request, params, None)
    }

    pub fn serve_with_cancel(
        &self,
        request: Request,
        params: RouteParams,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Response {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_serve_with_cancel(request, params, cancel)
        }));
        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                log::error!("endpoint '{}' failed: {} [{}]", self.name, err, err.code());
                Response::internal_error()
            }
            Err(payload) => {
                log::error!(
                    "endpoint '{}' recovered from a panic: {}",
                    self.name,
                    lifecycle::panic_message(payload.as_ref())
                );
                Response::internal_error()
            }
        }
    }

    /// Serves one request, returning errors and letting panics propagate.
    pub fn try_serve(&self, request: Request, params: RouteParams) -> CoreResult<Response> {
        self.try_serve_with_cancel(request, params, None)
    }

    pub fn try_serve_with_cancel(
        &self,
        request: Request,
        params: RouteParams,
        cancel: Option<watch::Receiver<bool>>,
    ) -> CoreResult<Response> {
        self.lifecycle.run(
            &self.registry,
            &self.name,
            request,
            params,
            cancel,
            self.chain.clone(),
        )
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("scope", &self.registry.id())
            .field("handlers", &self.chain.len())
            .finish()
    }
}
