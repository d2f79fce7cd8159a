#![allow(dead_code)]

use gantry::dispatcher::{DirectResponse, HandlerArg, HandlerRequest, HeaderVec};
use gantry::registry::{Controller, HandlerError};
use gantry::router::ParamVec;
use gantry::RequestId;
use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Scoped tracing subscriber for tests; logs go to the test writer and the
/// guard tears the subscriber down with the test.
pub struct TestTracing {
    _guard: tracing::subscriber::DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self { _guard: guard }
    }
}

/// Controller with canned handlers, counting every invocation.
pub struct TestController {
    pub calls: Arc<AtomicUsize>,
}

impl TestController {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Controller for TestController {
    fn call(&self, handler: &str, args: Vec<HandlerArg>) -> Result<Value, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match handler {
            // structured result: echoes resolved argument values in order
            "echo_args" => Ok(Value::Array(
                args.iter().map(HandlerArg::as_value).collect(),
            )),
            "get_item" => Ok(json!({
                "id": args.first().map(HandlerArg::as_value).unwrap_or(Value::Null),
            })),
            "raw" => Ok(json!("pong")),
            "silent" => Ok(Value::Null),
            "write_direct" => {
                for arg in &args {
                    if let HandlerArg::Response(slot) = arg {
                        slot.write(DirectResponse::new(201, "written directly"));
                    }
                }
                Ok(Value::Null)
            }
            "boom" => Err(HandlerError::new("boom")),
            other => Err(HandlerError::new(format!("unknown handler {other}"))),
        }
    }
}

/// Bare handler request for resolver/middleware-level tests.
pub fn test_request(method: Method, path: &str) -> HandlerRequest {
    HandlerRequest {
        request_id: RequestId::new(),
        method,
        path: path.to_string(),
        path_params: ParamVec::new(),
        query_params: ParamVec::new(),
        headers: HeaderVec::new(),
        cookies: HeaderVec::new(),
        body: None,
        session: None,
        user: None,
        remote_addr: None,
        hosts: None,
    }
}

pub fn header(name: &str, value: &str) -> (Arc<str>, String) {
    (Arc::from(name), value.to_string())
}

pub fn param(name: &str, value: &str) -> (Arc<str>, String) {
    (Arc::from(name), value.to_string())
}
