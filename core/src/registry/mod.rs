pub mod autowire;
pub mod binding;
pub mod disposer;
pub mod key;
pub mod scope;

pub use autowire::Autowire;
pub use binding::{AnyArc, Binding, BindingStore, ProviderFn};
pub use disposer::{cancel_all, close_all, dispose_all, Cancel, Close, Dispose};
pub use key::Key;
pub use scope::Registry;
