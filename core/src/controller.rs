//! # CONTROLLER BINDING
//!
//! **ARCHITECTURE**: A controller declares its actions in an [`ActionTable`]
//! instead of being reflected on. A [`Mapper`] turns named actions into
//! endpoints; each request borrows a pooled controller instance, autowires it
//! from the request scope, runs the action and returns the instance reset.

use crate::dispatch::{Context, Handler, Lifecycle, MiddlewareBundle, SharedHandler};
use crate::errors::{CoreError, CoreResult};
use crate::kernel::{Endpoint, Kernel};
use crate::memory::{ObjectPool, Reset};
use crate::registry::{Autowire, Registry};
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type Action<C> = fn(&mut C, &mut Context) -> CoreResult<()>;

/// Named actions of a controller type.
pub struct ActionTable<C> {
    actions: BTreeMap<&'static str, Action<C>>,
}

impl<C> ActionTable<C> {
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    pub fn action(mut self, name: &'static str, action: Action<C>) -> Self {
        self.actions.insert(name, action);
        self
    }

    pub fn get(&self, name: &str) -> Option<Action<C>> {
        self.actions.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<C> Default for ActionTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-scoped controller type.
///
/// Instances are pooled: [`Reset`] must drop everything injected or set
/// while serving a request.
pub trait Controller: Autowire + Reset + Default + Send + 'static {
    fn actions() -> ActionTable<Self>;
}

struct ActionHandler<C> {
    target: &'static str,
    action: Action<C>,
    pool: Arc<ObjectPool<C>>,
}

impl<C: Controller> Handler for ActionHandler<C> {
    fn handle(&self, ctx: &mut Context) -> CoreResult<()> {
        let mut controller = self.pool.acquire();
        if let Some(scope) = ctx.registry() {
            scope.autowire(controller.as_mut());
        }

        #[cfg(debug_assertions)]
        log::debug!("invoking {} action for '{}'", self.target, ctx.name);

        let result = (self.action)(controller.as_mut(), ctx);
        self.pool.release(controller);
        result
    }
}

/// **CONTROLLER MAPPER**
///
/// Binds actions of `C` as endpoints. Owns a child scope of the kernel and
/// its own middleware, seeded with the kernel's.
pub struct Mapper<C: Controller> {
    name: &'static str,
    registry: Registry,
    middleware: MiddlewareBundle,
    actions: ActionTable<C>,
    pool: Arc<ObjectPool<C>>,
    prefix: String,
    lifecycle: Arc<Lifecycle>,
}

impl<C: Controller> Mapper<C> {
    pub(crate) fn new(kernel: &Kernel) -> CoreResult<Self> {
        let registry = kernel.registry().try_fork()?;
        let name = short_type_name::<C>();

        #[cfg(debug_assertions)]
        log::debug!("mapping controller {} on scope #{}", name, registry.id());

        Ok(Self {
            name,
            registry,
            middleware: kernel.middleware().clone(),
            actions: C::actions(),
            pool: Arc::new(ObjectPool::new(kernel.config().pool_capacity)),
            prefix: kernel.prefix().to_string(),
            lifecycle: kernel.lifecycle().clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Scope shared by every action of this controller.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn add_middleware<H: Handler + 'static>(&mut self, handler: H) {
        self.middleware.add_middleware(handler);
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareBundle {
        &mut self.middleware
    }

    /// Pooled controller instances currently idle.
    pub fn idle_instances(&self) -> usize {
        self.pool.available()
    }

    /// Binds action `action` behind the mapper middleware and `filters`.
    ///
    /// Fails with `InvalidAction` when `C` declares no such action.
    pub fn bind_action(&self, action: &str, filters: &[SharedHandler]) -> CoreResult<Endpoint> {
        let Some(found) = self.actions.get(action) else {
            log::error!("controller {} has no action '{}'", self.name, action);
            return Err(CoreError::InvalidAction {
                target: self.name.to_string(),
                action: action.to_string(),
            });
        };

        let handler: SharedHandler = Arc::new(ActionHandler {
            target: self.name,
            action: found,
            pool: self.pool.clone(),
        });
        let chain = self.middleware.build_chain(filters, handler);
        Ok(Endpoint::new(
            format!("{}{}.{}", self.prefix, self.name, action),
            &self.registry,
            chain,
            self.lifecycle.clone(),
        ))
    }

    /// Like [`Mapper::bind_action`], for startup code where a missing action
    /// is a programming error.
    ///
    /// # Panics
    ///
    /// When `C` declares no such action.
    pub fn must_bind_action(&self, action: &str, filters: &[SharedHandler]) -> Endpoint {
        match self.bind_action(action, filters) {
            Ok(endpoint) => endpoint,
            Err(err) => panic!("{}", err),
        }
    }

    /// Disposes the controller scope. Endpoints bound from this mapper hold
    /// handles to it and count as outstanding until dropped.
    pub fn dispose(&self) -> CoreResult<usize> {
        self.registry.dispose()
    }
}

impl<C: Controller> fmt::Debug for Mapper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("name", &self.name)
            .field("scope", &self.registry.id())
            .field("actions", &self.actions.names().collect::<Vec<_>>())
            .field("middleware", &self.middleware)
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::events::NullEmitter;
    use crate::request::{Request, RouteParams};
    use crate::response::ResponseBody;

    struct UserStore {
        names: Vec<&'static str>,
    }

    #[derive(Default)]
    struct UsersController {
        store: Option<Arc<UserStore>>,
        served: usize,
    }

    impl Autowire for UsersController {
        fn autowire(&mut self, registry: &Registry) {
            registry.inject(&mut self.store);
        }
    }

    impl Reset for UsersController {
        fn reset(&mut self) {
            self.store = None;
            self.served = 0;
        }
    }

    impl UsersController {
        fn index(&mut self, ctx: &mut Context) -> CoreResult<()> {
            self.served += 1;
            let names = self.store.as_ref().map(|s| s.names.join(",")).unwrap_or_default();
            ctx.send_text(200, format!("{} (served {})", names, self.served));
            Ok(())
        }

        fn show(&mut self, ctx: &mut Context) -> CoreResult<()> {
            let index: usize = ctx
                .param("id")
                .and_then(|id| id.parse().ok())
                .unwrap_or(usize::MAX);
            match self.store.as_ref().and_then(|s| s.names.get(index)) {
                Some(name) => ctx.send_text(200, *name),
                None => ctx.send_text(404, "no such user"),
            }
            Ok(())
        }
    }

    impl Controller for UsersController {
        fn actions() -> ActionTable<Self> {
            ActionTable::new()
                .action("index", Self::index)
                .action("show", Self::show)
        }
    }

    fn kernel() -> Kernel {
        let kernel = Kernel::new(KernelConfig::default(), Arc::new(NullEmitter));
        kernel.registry().bind_value(UserStore {
            names: vec!["ada", "grace"],
        });
        kernel
    }

    #[test]
    fn test_bind_action_serves_with_fresh_instance() {
        let kernel = kernel();
        let mapper = kernel.controller::<UsersController>().unwrap();
        let index = mapper.bind_action("index", &[]).unwrap();
        assert_eq!(index.name(), "UsersController.index");

        for _ in 0..2 {
            let response = index.serve(Request::default(), RouteParams::new());
            assert_eq!(response.body, ResponseBody::Text("ada,grace (served 1)".into()));
        }
        assert_eq!(mapper.idle_instances(), 1);
        assert_eq!(mapper.registry().live_children(), 0);
    }

    #[test]
    fn test_route_params_reach_action() {
        let kernel = kernel();
        let mapper = kernel.controller::<UsersController>().unwrap();
        let show = mapper.bind_action("show", &[]).unwrap();

        let mut params = RouteParams::new();
        params.insert("id", "1");
        let response = show.serve(Request::default(), params);
        assert_eq!(response.body, ResponseBody::Text("grace".into()));

        let response = show.serve(Request::default(), RouteParams::new());
        assert_eq!(response.status_code, 404);
    }

    #[test]
    fn test_unknown_action_is_invalid() {
        let kernel = kernel();
        let mapper = kernel.controller::<UsersController>().unwrap();
        match mapper.bind_action("destroy", &[]) {
            Err(CoreError::InvalidAction { target, action }) => {
                assert_eq!(target, "UsersController");
                assert_eq!(action, "destroy");
            }
            other => panic!("expected InvalidAction, got {:?}", other.map(|e| e.name().to_string())),
        }
    }

    #[test]
    #[should_panic(expected = "INVALID ACTION")]
    fn test_must_bind_unknown_action_panics() {
        let kernel = kernel();
        let mapper = kernel.controller::<UsersController>().unwrap();
        mapper.must_bind_action("destroy", &[]);
    }

    #[test]
    fn test_mapper_scope_is_a_kernel_child() {
        let kernel = kernel();
        let mapper = kernel.controller::<UsersController>().unwrap();
        assert_eq!(kernel.registry().live_children(), 1);
        assert_eq!(mapper.dispose().unwrap(), 0);
        assert_eq!(kernel.registry().live_children(), 0);
    }
}
