pub mod context;
pub mod handler;
pub mod lifecycle;

pub use context::Context;
pub use handler::{handler_fn, Chain, Handler, MiddlewareBundle, SharedHandler};
pub use lifecycle::{dispatch, Lifecycle, Teardown};
