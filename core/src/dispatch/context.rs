use crate::dispatch::handler::Chain;
use crate::errors::{CoreError, CoreResult};
use crate::memory::Reset;
use crate::registry::{Key, Registry};
use crate::request::{parse_query_string, Request, RouteParams};
use crate::response::{Response, ResponseBody};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// **PER-REQUEST CONTEXT**
///
/// **PURPOSE**: Carries the request, the response being built, the route
/// parameters, the request scope and the chain cursor through every handler.
/// **GUARANTEE**: Pooled contexts are fully reset between requests; nothing a
/// handler stores here survives into the next request.
#[derive(Default)]
pub struct Context {
    pub name: String,
    pub request: Request,
    pub response: Response,
    pub params: RouteParams,
    registry: Option<Registry>,
    cancel: Option<watch::Receiver<bool>>,
    query: Option<HashMap<String, String>>,
    chain: Option<Chain>,
    cursor: usize,
}

impl Context {
    /// Binds this context to one request.
    pub(crate) fn install(
        &mut self,
        name: &str,
        registry: Registry,
        request: Request,
        params: RouteParams,
        cancel: Option<watch::Receiver<bool>>,
    ) {
        self.name.push_str(name);
        self.registry = Some(registry);
        self.request = request;
        self.params = params;
        self.cancel = cancel;
    }

    /// Installs `chain` and rewinds the cursor to its first handler.
    pub(crate) fn install_chain(&mut self, chain: Chain) {
        self.chain = Some(chain);
        self.cursor = 0;
    }

    /// Detaches the request scope so the caller can dispose it.
    pub(crate) fn take_registry(&mut self) -> Option<Registry> {
        self.registry.take()
    }

    // ============================================================================================
    // CHAIN CONTROL
    // ============================================================================================

    /// Runs the next handler of the chain.
    ///
    /// Fails with `ExhaustedChain` when no handler is left.
    pub fn next(&mut self) -> CoreResult<()> {
        let handler = self
            .chain
            .as_ref()
            .and_then(|chain| chain.get(self.cursor))
            .cloned()
            .ok_or_else(|| CoreError::ExhaustedChain {
                name: self.name.clone(),
            })?;
        self.cursor += 1;
        handler.handle(self)
    }

    /// Handlers not yet entered.
    pub fn remaining(&self) -> usize {
        self.chain
            .as_ref()
            .map_or(0, |chain| chain.len().saturating_sub(self.cursor))
    }

    // ============================================================================================
    // SCOPE ACCESS
    // ============================================================================================

    /// The request scope, present while the context is dispatched.
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> CoreResult<Arc<T>> {
        match &self.registry {
            Some(registry) => registry.resolve::<T>(),
            None => Err(CoreError::NotFound {
                key: Key::of::<T>().to_string(),
            }),
        }
    }

    // ============================================================================================
    // REQUEST ACCESSORS
    // ============================================================================================

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Decoded query-string value; the query is parsed once per request.
    pub fn query_value(&mut self, name: &str) -> Option<&str> {
        let request = &self.request;
        self.query
            .get_or_insert_with(|| parse_query_string(&request.query))
            .get(name)
            .map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Whether the transport signalled that the client went away.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// A receiver for handlers that want to await cancellation.
    pub fn cancellation(&self) -> Option<watch::Receiver<bool>> {
        self.cancel.clone()
    }

    // ============================================================================================
    // RESPONSE WRITERS
    // ============================================================================================

    /// Appends text to the response body.
    pub fn write_str(&mut self, text: &str) {
        match &mut self.response.body {
            ResponseBody::Text(body) => body.push_str(text),
            ResponseBody::Binary(body) => body.extend_from_slice(text.as_bytes()),
            body @ ResponseBody::Empty => *body = ResponseBody::Text(text.to_owned()),
        }
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response.headers.insert(name.into(), value.into());
    }

    /// Replaces the response with a plain-text body.
    pub fn send_text(&mut self, status: u16, content: impl Into<String>) {
        self.response.status_code = status;
        self.set_header("Content-Type", "text/plain; charset=utf-8");
        self.response.body = ResponseBody::Text(content.into());
    }

    /// Temporary redirect (302).
    pub fn redirect(&mut self, url: &str) {
        self.redirect_status(url, 302);
    }

    pub fn redirect_status(&mut self, url: &str, status: u16) {
        self.response.status_code = status;
        self.set_header("Location", url);
    }
}

impl Reset for Context {
    fn reset(&mut self) {
        self.name.clear();
        self.request = Request::default();
        self.response.reset();
        self.params.clear();
        self.registry = None;
        self.cancel = None;
        self.query = None;
        self.chain = None;
        self.cursor = 0;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("scope", &self.registry.as_ref().map(Registry::id))
            .field("cursor", &self.cursor)
            .field("remaining", &self.remaining())
            .finish()
    }
}
