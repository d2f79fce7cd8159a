//! Dispatch pipeline coverage: envelope invariants, interceptor
//! short-circuiting, middleware aborts, error conversion, telemetry
//! lifecycle.

mod common;

use common::{param, TestController, TestTracing};
use gantry::context::RequestContext;
use gantry::dispatcher::{
    Dispatched, Dispatcher, HandlerRef, HandlerRequest, Next, ResponseSlot, SPAN_REQUEST,
};
use gantry::interceptor::{AfterRender, Interceptor};
use gantry::meta::{ParamDescriptor, ParamSource, RouteDescriptor};
use gantry::middleware::{MiddlewareError, RouteMiddleware};
use gantry::registry::Controller;
use gantry::router::{RouteEntry, Router};
use gantry::telemetry::TelemetryRecorder;
use gantry::RequestId;
use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Harness {
    router: Router,
    dispatcher: Dispatcher,
    telemetry: Arc<TelemetryRecorder>,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new(routes: Vec<RouteDescriptor>) -> Self {
        let telemetry = Arc::new(TelemetryRecorder::new());
        let mut dispatcher = Dispatcher::new(Arc::clone(&telemetry));
        let mut router = Router::new();
        let controller = TestController::new();
        let calls = Arc::clone(&controller.calls);
        let controller: Arc<dyn Controller> = Arc::new(controller);
        for descriptor in &routes {
            let entry = Arc::new(RouteEntry::bind(descriptor, "test", "/items"));
            unsafe {
                dispatcher.register_route(&entry, Arc::clone(&controller));
            }
            router.add_route(entry);
        }
        Self {
            router,
            dispatcher,
            telemetry,
            calls,
        }
    }

    fn dispatch(
        &self,
        method: Method,
        path: &str,
        debug: bool,
    ) -> Result<Dispatched, MiddlewareError> {
        let route_match = self.router.route(&method, path).expect("route must match");
        let ctx = RequestContext::new(RequestId::new(), &method, path, debug);
        self.telemetry.start(SPAN_REQUEST, ctx.request_id);

        let mut req = common::test_request(method, &route_match.route.full_path);
        req.request_id = ctx.request_id;
        req.path_params = route_match.path_params.clone();

        self.dispatcher.dispatch(&route_match, req, &ctx)
    }
}

struct Halt;

impl Interceptor for Halt {
    fn intercept(
        &self,
        _req: &HandlerRequest,
        _res: &ResponseSlot,
        _next: &Next,
        _handler: &HandlerRef,
    ) -> bool {
        true
    }
}

struct PassThrough;

impl Interceptor for PassThrough {
    fn intercept(
        &self,
        _req: &HandlerRequest,
        _res: &ResponseSlot,
        _next: &Next,
        _handler: &HandlerRef,
    ) -> bool {
        false
    }
}

struct RecordRender {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl AfterRender for RecordRender {
    fn after_render(
        &self,
        _req: &HandlerRequest,
        _res: &ResponseSlot,
        _next: &Next,
        _handler: &HandlerRef,
        content: &Value,
    ) {
        self.seen.lock().unwrap().push(content.clone());
    }
}

struct Deny;

impl RouteMiddleware for Deny {
    fn handle(&self, _req: &mut HandlerRequest) -> Result<(), MiddlewareError> {
        Err(MiddlewareError::new(401, "denied"))
    }
}

struct Tag;

impl RouteMiddleware for Tag {
    fn handle(&self, req: &mut HandlerRequest) -> Result<(), MiddlewareError> {
        req.user = Some(json!({"name": "mw"}));
        Ok(())
    }
}

#[test]
fn success_produces_exactly_one_envelope_and_clears_telemetry() {
    let _tracing = TestTracing::init();
    let harness = Harness::new(vec![RouteDescriptor::new(
        Method::GET,
        "/{id}",
        "get_item",
    )
    .with_params(vec![ParamDescriptor::new(0, ParamSource::Param, Some("id"))])]);

    let dispatched = harness.dispatch(Method::GET, "/items/42", false).unwrap();
    let Dispatched::Envelope(envelope) = dispatched else {
        panic!("expected envelope");
    };
    assert_eq!(envelope.status, 200);
    let value = envelope.to_value();
    assert_eq!(value["data"]["id"], "42");
    assert!(value.get("message").is_none());
    assert!(value.get("requestId").is_none());
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);
    // invariant: telemetry fully cleared after dispatch
    assert_eq!(harness.telemetry.tracked_requests(), 0);
}

#[test]
fn interceptor_short_circuit_skips_handler_and_after_render() {
    let _tracing = TestTracing::init();
    let mut harness = Harness::new(vec![RouteDescriptor::new(Method::GET, "", "get_item")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    harness
        .dispatcher
        .hooks_mut()
        .register_interceptor("get::/items", Arc::new(Halt));
    harness.dispatcher.hooks_mut().register_after_render(
        "get::/items",
        Arc::new(RecordRender {
            seen: Arc::clone(&seen),
        }),
    );

    let dispatched = harness.dispatch(Method::GET, "/items", false).unwrap();
    assert!(matches!(dispatched, Dispatched::Direct(None)));
    assert_eq!(harness.calls.load(Ordering::SeqCst), 0);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(harness.telemetry.tracked_requests(), 0);
}

#[test]
fn non_short_circuiting_interceptors_run_in_order_then_handler() {
    let _tracing = TestTracing::init();
    let mut harness = Harness::new(vec![RouteDescriptor::new(Method::GET, "", "raw")]);
    harness
        .dispatcher
        .hooks_mut()
        .register_interceptor("get::/items", Arc::new(PassThrough));
    harness
        .dispatcher
        .hooks_mut()
        .register_interceptor("get::/items", Arc::new(PassThrough));

    let dispatched = harness.dispatch(Method::GET, "/items", false).unwrap();
    assert!(matches!(dispatched, Dispatched::Raw(ref body) if body == "pong"));
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_error_becomes_500_envelope_with_message() {
    let _tracing = TestTracing::init();
    let harness = Harness::new(vec![RouteDescriptor::new(Method::GET, "/boom", "boom")]);

    let dispatched = harness.dispatch(Method::GET, "/items/boom", false).unwrap();
    let Dispatched::Envelope(envelope) = dispatched else {
        panic!("expected envelope");
    };
    assert_eq!(envelope.status, 500);
    let value = envelope.to_value();
    assert_eq!(value["message"], "boom");
    assert!(value["processingTime"].is_number());
    assert!(value.get("data").is_none());
    assert!(value.get("requestId").is_none());
    assert_eq!(harness.telemetry.tracked_requests(), 0);
}

#[test]
fn debug_flag_adds_request_id_and_telemetry_to_error_envelope() {
    let _tracing = TestTracing::init();
    let harness = Harness::new(vec![RouteDescriptor::new(Method::GET, "/boom", "boom")]);

    let dispatched = harness.dispatch(Method::GET, "/items/boom", true).unwrap();
    let Dispatched::Envelope(envelope) = dispatched else {
        panic!("expected envelope");
    };
    let value = envelope.to_value();
    assert_eq!(value["status"], 500);
    assert_eq!(value["message"], "boom");
    assert!(value["requestId"].is_string());
    let telemetry = value["telemetry"].as_array().expect("telemetry array");
    assert!(telemetry
        .iter()
        .any(|span| span["name"] == "Controller Handler"));
    assert!(telemetry.iter().any(|span| span["name"] == "Request Process"));
    // the snapshot lives in the envelope; the store itself is cleared
    assert_eq!(harness.telemetry.tracked_requests(), 0);
}

#[test]
fn middleware_failure_prevents_handler_and_yields_no_envelope() {
    let _tracing = TestTracing::init();
    let harness = Harness::new(vec![
        RouteDescriptor::new(Method::POST, "", "get_item").with_middleware(Arc::new(Deny))
    ]);

    let result = harness.dispatch(Method::POST, "/items", false);
    let err = result.expect_err("middleware failure must surface as Err");
    assert_eq!(err.status(), 401);
    assert_eq!(err.message(), "denied");
    assert_eq!(harness.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.telemetry.tracked_requests(), 0);
}

#[test]
fn route_middleware_runs_before_handler_and_may_mutate_request() {
    let _tracing = TestTracing::init();
    let harness = Harness::new(vec![RouteDescriptor::new(Method::GET, "", "echo_args")
        .with_middleware(Arc::new(Tag))
        .with_params(vec![ParamDescriptor::new(0, ParamSource::User, None)])]);

    let dispatched = harness.dispatch(Method::GET, "/items", false).unwrap();
    let Dispatched::Envelope(envelope) = dispatched else {
        panic!("expected envelope");
    };
    assert_eq!(envelope.to_value()["data"], json!([{"name": "mw"}]));
}

#[test]
fn raw_and_silent_result_classification() {
    let _tracing = TestTracing::init();
    let harness = Harness::new(vec![
        RouteDescriptor::new(Method::GET, "/raw", "raw"),
        RouteDescriptor::new(Method::GET, "/silent", "silent"),
        RouteDescriptor::new(Method::GET, "/direct", "write_direct").with_params(vec![
            ParamDescriptor::new(0, ParamSource::Response, None),
        ]),
    ]);

    let raw = harness.dispatch(Method::GET, "/items/raw", false).unwrap();
    assert!(matches!(raw, Dispatched::Raw(ref body) if body == "pong"));

    let silent = harness.dispatch(Method::GET, "/items/silent", false).unwrap();
    assert!(matches!(silent, Dispatched::Direct(None)));

    let direct = harness.dispatch(Method::GET, "/items/direct", false).unwrap();
    let Dispatched::Direct(Some(response)) = direct else {
        panic!("expected direct response");
    };
    assert_eq!(response.status, 201);
    assert_eq!(response.body, "written directly");
}

#[test]
fn after_render_observes_success_and_error_content() {
    let _tracing = TestTracing::init();
    let mut harness = Harness::new(vec![
        RouteDescriptor::new(Method::GET, "/ok", "get_item"),
        RouteDescriptor::new(Method::GET, "/boom", "boom"),
    ]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    for route_id in ["get::/items/ok", "get::/items/boom"] {
        harness.dispatcher.hooks_mut().register_after_render(
            route_id,
            Arc::new(RecordRender {
                seen: Arc::clone(&seen),
            }),
        );
    }

    harness.dispatch(Method::GET, "/items/ok", false).unwrap();
    harness.dispatch(Method::GET, "/items/boom", false).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0]["status"], 200);
    assert_eq!(seen[1]["status"], 500);
    assert_eq!(seen[1]["message"], "boom");
}

#[test]
fn unregistered_route_identity_yields_500_envelope() {
    let _tracing = TestTracing::init();
    // bind the route into the router but not the dispatcher
    let telemetry = Arc::new(TelemetryRecorder::new());
    let dispatcher = Dispatcher::new(Arc::clone(&telemetry));
    let mut router = Router::new();
    let descriptor = RouteDescriptor::new(Method::GET, "/{id}", "get_item");
    router.add_route(Arc::new(RouteEntry::bind(&descriptor, "test", "/items")));

    let route_match = router.route(&Method::GET, "/items/42").unwrap();
    let ctx = RequestContext::new(RequestId::new(), &Method::GET, "/items/42", false);
    let mut req = common::test_request(Method::GET, "/items/{id}");
    req.path_params.push(param("id", "42"));

    let dispatched = dispatcher.dispatch(&route_match, req, &ctx).unwrap();
    let Dispatched::Envelope(envelope) = dispatched else {
        panic!("expected envelope");
    };
    assert_eq!(envelope.status, 500);
}
