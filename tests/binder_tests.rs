//! Controller binder coverage: fail-fast dependency resolution, construction
//! through the provider map, and preserved registration order.

mod common;

use common::TestTracing;
use gantry::binder::ControllerBinder;
use gantry::dispatcher::{Dispatcher, HandlerArg};
use gantry::meta::{ControllerDescriptor, RouteDescriptor};
use gantry::registry::{
    BindError, Controller, ControllerRegistry, HandlerError, ProviderMap,
};
use gantry::router::Router;
use gantry::telemetry::TelemetryRecorder;
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;

/// Minimal injectable dependency.
struct Greeting {
    text: String,
}

struct HelloController {
    greeting: Arc<Greeting>,
}

impl Controller for HelloController {
    fn call(&self, handler: &str, _args: Vec<HandlerArg>) -> Result<Value, HandlerError> {
        match handler {
            "hello" => Ok(json!({ "greeting": self.greeting.text })),
            other => Err(HandlerError::new(format!("unknown handler {other}"))),
        }
    }
}

fn hello_descriptor() -> ControllerDescriptor {
    ControllerDescriptor::new("hello", "/hello")
        .with_dependencies(&["greeting"])
        .with_route(RouteDescriptor::new(Method::GET, "", "hello"))
}

fn registry_with_hello() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry.register(hello_descriptor(), |providers| {
        let greeting = providers.get::<Greeting>("greeting")?;
        Ok(Arc::new(HelloController { greeting }))
    });
    registry
}

#[test]
fn unresolved_dependency_fails_fast_before_construction() {
    let _tracing = TestTracing::init();
    let registry = registry_with_hello();
    let providers = ProviderMap::new(); // "greeting" missing

    let telemetry = Arc::new(TelemetryRecorder::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&telemetry));
    let mut router = Router::new();
    let mut binder = ControllerBinder::new(&mut router, &mut dispatcher, &providers);

    let err = unsafe { binder.bind_all(&registry) }.expect_err("must fail");
    assert!(matches!(
        err,
        BindError::UnresolvedDependency { ref controller, ref key }
            if controller == "hello" && key == "greeting"
    ));
    assert!(router.is_empty());
    assert_eq!(dispatcher.handler_count(), 0);
}

#[test]
fn construction_failure_is_fatal_and_attributed() {
    let _tracing = TestTracing::init();
    let mut registry = ControllerRegistry::new();
    registry.register(ControllerDescriptor::new("broken", "/broken"), |_| {
        Err(anyhow::anyhow!("database offline"))
    });
    let providers = ProviderMap::new();

    let telemetry = Arc::new(TelemetryRecorder::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&telemetry));
    let mut router = Router::new();
    let mut binder = ControllerBinder::new(&mut router, &mut dispatcher, &providers);

    let err = unsafe { binder.bind_all(&registry) }.expect_err("must fail");
    assert!(matches!(
        err,
        BindError::Construction { ref controller, .. } if controller == "broken"
    ));
}

#[test]
fn binds_controller_and_registers_routes() {
    let _tracing = TestTracing::init();
    let registry = registry_with_hello();
    let mut providers = ProviderMap::new();
    providers.insert(
        "greeting",
        Arc::new(Greeting {
            text: "hi there".to_string(),
        }),
    );

    let telemetry = Arc::new(TelemetryRecorder::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&telemetry));
    let mut router = Router::new();
    {
        let mut binder = ControllerBinder::new(&mut router, &mut dispatcher, &providers);
        unsafe { binder.bind_all(&registry) }.expect("bind");
    }

    assert_eq!(router.len(), 1);
    assert_eq!(dispatcher.handler_count(), 1);
    let route_match = router.route(&Method::GET, "/hello").expect("route bound");
    assert_eq!(route_match.route.route_id, "get::/hello");
    assert_eq!(route_match.route.controller, "hello");
}

#[test]
fn registration_order_decides_precedence_across_controllers() {
    let _tracing = TestTracing::init();
    struct Static;
    impl Controller for Static {
        fn call(&self, handler: &str, _args: Vec<HandlerArg>) -> Result<Value, HandlerError> {
            Ok(json!({ "handler": handler }))
        }
    }

    let mut registry = ControllerRegistry::new();
    registry.register(
        ControllerDescriptor::new("specific", "/items")
            .with_route(RouteDescriptor::new(Method::GET, "/special", "special")),
        |_| Ok(Arc::new(Static)),
    );
    registry.register(
        ControllerDescriptor::new("generic", "/items")
            .with_route(RouteDescriptor::new(Method::GET, "/{id}", "by_id")),
        |_| Ok(Arc::new(Static)),
    );

    let providers = ProviderMap::new();
    let telemetry = Arc::new(TelemetryRecorder::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&telemetry));
    let mut router = Router::new();
    {
        let mut binder = ControllerBinder::new(&mut router, &mut dispatcher, &providers);
        unsafe { binder.bind_all(&registry) }.expect("bind");
    }

    // first registered wins on overlap; the adapter never reorders
    let m = router.route(&Method::GET, "/items/special").unwrap();
    assert_eq!(m.route.handler_name, "special");
    let m = router.route(&Method::GET, "/items/42").unwrap();
    assert_eq!(m.route.handler_name, "by_id");
}
