use crate::dispatcher::HeaderVec;
use may_minihttp::Response;
use serde_json::Value;
use std::sync::Arc;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Response body as it leaves the adapter.
#[derive(Debug, Clone)]
pub enum WireBody {
    Json(Value),
    Text(String),
    Empty,
}

/// Outgoing response, accumulated so global middleware can observe and
/// mutate headers before anything touches the transport.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: WireBody,
}

impl WireResponse {
    pub fn new(status: u16, body: WireBody) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, WireBody::Json(body))
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (name matched case-insensitively).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }
}

/// Write an accumulated response to the transport.
pub fn write_wire_response(res: &mut Response, wire: WireResponse) {
    res.status_code(wire.status as usize, status_reason(wire.status));

    let has_content_type = wire.get_header("content-type").is_some();
    for (name, value) in &wire.headers {
        // may_minihttp takes whole `Name: value` lines with 'static lifetime
        let line = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(line));
    }

    match wire.body {
        WireBody::Json(value) => {
            if !has_content_type {
                res.header("Content-Type: application/json");
            }
            res.body_vec(serde_json::to_vec(&value).unwrap_or_default());
        }
        WireBody::Text(text) => {
            if !has_content_type {
                res.header("Content-Type: text/plain");
            }
            res.body_vec(text.into_bytes());
        }
        WireBody::Empty => {}
    }
}

/// Transport-level JSON error, used for the generic error path (404, bad
/// requests, middleware failures). Never an envelope.
pub fn write_json_error(res: &mut Response, status: u16, body: Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}
