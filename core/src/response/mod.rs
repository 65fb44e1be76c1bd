pub mod serializer;
pub mod types;

pub use serializer::{create_response, serialize_response_body};
pub use types::{Response, ResponseBody};
