use crate::memory::Reset;
use std::collections::HashMap;

/// Outbound response filled in by handlers and handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseBody {
    #[default]
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: HashMap::new(),
            body: ResponseBody::Empty,
        }
    }
}

impl Response {
    /// Generic failure reported after a recovered handler panic or a
    /// propagated error.
    pub fn internal_error() -> Self {
        crate::response::create_response(500, ResponseBody::Text("Internal Server Error".into()))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        crate::response::serialize_response_body(&self.body)
    }
}

impl Reset for Response {
    fn reset(&mut self) {
        self.status_code = 200;
        self.headers.clear();
        self.body = ResponseBody::Empty;
    }
}
