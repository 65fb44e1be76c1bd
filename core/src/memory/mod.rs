pub mod pool;

pub use pool::{ObjectPool, Reset};
