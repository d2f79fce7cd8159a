//! Top-level adapter: wires configuration, telemetry, hooks, binding and the
//! server lifecycle together, in a fixed initialization order.

use crate::binder::ControllerBinder;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::interceptor::{AfterRender, Interceptor};
use crate::middleware::{
    CorsMiddleware, Middleware, RequestMetrics, SecurityHeadersMiddleware,
};
use crate::registry::{BindError, ControllerRegistry, ProviderMap};
use crate::router::Router;
use crate::server::{AppService, ConnectionSet, ServerLifecycle};
use crate::telemetry::TelemetryRecorder;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

/// The adapter owns every moving part and enforces the startup order:
/// global middleware installation, then controller binding, then server
/// startup. Nothing here is process-global: configuration, registries and
/// recorders are explicit values threaded through the components.
///
/// ```no_run
/// use gantry::adapter::Adapter;
/// use gantry::config::Config;
/// use gantry::registry::{ControllerRegistry, ProviderMap};
///
/// let mut adapter = Adapter::new(Config::new());
/// let registry = ControllerRegistry::new();
/// let providers = ProviderMap::new();
/// unsafe {
///     adapter.initialize(&registry, &providers).unwrap();
/// }
/// adapter.listen("127.0.0.1:8080").unwrap();
/// // ...
/// adapter.close().unwrap();
/// ```
pub struct Adapter {
    config: Config,
    telemetry: Arc<TelemetryRecorder>,
    metrics: Arc<RequestMetrics>,
    router: Arc<RwLock<Router>>,
    dispatcher: Arc<RwLock<Dispatcher>>,
    lifecycle: ServerLifecycle,
    extra_middleware: Vec<Arc<dyn Middleware>>,
    service: Option<AppService>,
}

impl Adapter {
    pub fn new(config: Config) -> Self {
        let telemetry = Arc::new(TelemetryRecorder::new());
        let dispatcher = Dispatcher::new(Arc::clone(&telemetry));
        Self {
            config,
            telemetry,
            metrics: Arc::new(RequestMetrics::new()),
            router: Arc::new(RwLock::new(Router::new())),
            dispatcher: Arc::new(RwLock::new(dispatcher)),
            lifecycle: ServerLifecycle::new(),
            extra_middleware: Vec::new(),
            service: None,
        }
    }

    #[must_use]
    pub fn telemetry(&self) -> &Arc<TelemetryRecorder> {
        &self.telemetry
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<RequestMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionSet> {
        self.lifecycle.connections()
    }

    /// Install an additional global middleware ahead of initialization.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.extra_middleware.push(mw);
    }

    /// Register an interceptor for a route identity (`"get::/items/{id}"`).
    pub fn register_interceptor(&self, route_id: &str, hook: Arc<dyn Interceptor>) {
        self.dispatcher
            .write()
            .unwrap()
            .hooks_mut()
            .register_interceptor(route_id, hook);
    }

    /// Register an after-render hook for a route identity.
    pub fn register_after_render(&self, route_id: &str, hook: Arc<dyn AfterRender>) {
        self.dispatcher
            .write()
            .unwrap()
            .hooks_mut()
            .register_after_render(route_id, hook);
    }

    /// Initialize the adapter: install global middleware, then bind every
    /// controller in the registry. Must be called before [`Adapter::listen`].
    ///
    /// Unresolved dependencies and controller construction failures abort
    /// initialization; there is no partial startup.
    ///
    /// # Safety
    ///
    /// Spawns handler coroutines; the `may` runtime must be initialized and
    /// the adapter must not yet be serving traffic.
    pub unsafe fn initialize(
        &mut self,
        registry: &ControllerRegistry,
        providers: &ProviderMap,
    ) -> Result<(), BindError> {
        let mut service = AppService::new(
            Arc::clone(&self.router),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.telemetry),
        );

        // stage 1: global middleware
        service.add_middleware(Arc::clone(&self.metrics) as Arc<dyn Middleware>);
        if self.config.get::<bool>("server.cors", true) {
            service.add_middleware(Arc::new(CorsMiddleware::default()));
        }
        for mw in &self.extra_middleware {
            service.add_middleware(Arc::clone(mw));
        }
        service.add_middleware(Arc::new(SecurityHeadersMiddleware::from_config(
            &self.config,
        )));

        // stage 2: controller binding
        {
            let mut router = self.router.write().unwrap();
            let mut dispatcher = self.dispatcher.write().unwrap();
            let mut binder = ControllerBinder::new(&mut router, &mut dispatcher, providers);
            // SAFETY: forwarded caller contract.
            unsafe {
                binder.bind_all(registry)?;
            }
        }

        self.service = Some(service);
        Ok(())
    }

    /// Stage 3: bind the transport and start accepting connections.
    pub fn listen(&mut self, bind_addr: &str) -> io::Result<SocketAddr> {
        let service = self.service.clone().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "adapter is not initialized")
        })?;
        self.lifecycle.listen(service, bind_addr)
    }

    /// Hard stop; see [`ServerLifecycle::close`]. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        self.lifecycle.close()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.lifecycle.is_listening()
    }
}
