use crate::response::types::{Response, ResponseBody};
use std::collections::HashMap;

pub fn create_response(status: u16, body: ResponseBody) -> Response {
    let mut headers = HashMap::new();

    match &body {
        ResponseBody::Text(_) => {
            headers.insert("Content-Type".to_string(), "text/plain".to_string());
        }
        ResponseBody::Binary(_) => {
            headers.insert(
                "Content-Type".to_string(),
                "application/octet-stream".to_string(),
            );
        }
        ResponseBody::Empty => {}
    }

    Response {
        status_code: status,
        headers,
        body,
    }
}

pub fn serialize_response_body(body: &ResponseBody) -> Vec<u8> {
    match body {
        ResponseBody::Empty => vec![],
        ResponseBody::Text(text) => text.as_bytes().to_vec(),
        ResponseBody::Binary(data) => data.clone(),
    }
}
