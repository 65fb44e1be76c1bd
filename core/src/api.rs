pub use crate::config::{KernelConfig, DEFAULT_POOL_CAPACITY};
pub use crate::controller::{Action, ActionTable, Controller, Mapper};
pub use crate::dispatch::{
    dispatch, handler_fn, Chain, Context, Handler, Lifecycle, MiddlewareBundle, SharedHandler,
    Teardown,
};
pub use crate::errors::{error_codes, CoreError, CoreResult};
pub use crate::events::{emit, emitter, install_emitter, Emitter, NullEmitter};
pub use crate::kernel::{Component, Endpoint, Kernel};
pub use crate::memory::{ObjectPool, Reset};
pub use crate::registry::{
    cancel_all, close_all, dispose_all, Autowire, Binding, Cancel, Close, Dispose, Key, Registry,
};
pub use crate::request::{parse_query_string, Method, Request, RouteParams};
pub use crate::response::{create_response, Response, ResponseBody};
