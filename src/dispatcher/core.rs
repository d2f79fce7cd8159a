use crate::context::RequestContext;
use crate::ids::RequestId;
use crate::interceptor::HookRegistry;
use crate::middleware::MiddlewareError;
use crate::registry::{Controller, HandlerError};
use crate::resolver::resolve_args;
use crate::router::{ParamVec, RouteEntry, RouteMatch};
use crate::runtime_config::RuntimeConfig;
use crate::telemetry::TelemetryRecorder;
use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::envelope::{classify, Classified, ResponseEnvelope};

/// Maximum inline headers/cookies before heap allocation.
/// Most requests carry ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path.
///
/// Header names use `Arc<str>`: names repeat across requests
/// (`content-type`, `authorization`, …) and an `Arc` clone is an O(1)
/// refcount bump. Values are per-request data and stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Name of the span covering the whole request, opened by the service when
/// the request context is created and closed by the dispatch pipeline.
pub const SPAN_REQUEST: &str = "Request Process";

/// Name of the span covering the handler invocation itself.
pub const SPAN_HANDLER: &str = "Controller Handler";

/// Request data passed to a handler coroutine.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request id for tracing and telemetry correlation.
    pub request_id: RequestId,
    pub method: Method,
    /// Matched route pattern (full path).
    pub path: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    /// HTTP headers, lowercase names.
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    /// Request body parsed as JSON, when present.
    pub body: Option<Value>,
    /// Session object attached by the host application's session layer.
    pub session: Option<Value>,
    /// Authenticated user object attached by the host application.
    pub user: Option<Value>,
    /// Remote address as reported by forwarding headers, when known.
    pub remote_addr: Option<String>,
    /// Resolved virtual-host mapping for the request.
    pub hosts: Option<Value>,
}

impl HandlerRequest {
    /// Get a path parameter by name. Last write wins when duplicate names
    /// exist at different path depths.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name. Last write wins for duplicates.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Entire query mapping as a JSON object.
    #[must_use]
    pub fn query_map(&self) -> Value {
        Value::Object(
            self.query_params
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Entire header mapping as a JSON object.
    #[must_use]
    pub fn header_map(&self) -> Value {
        Value::Object(
            self.headers
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// A response written directly by a handler or interceptor, bypassing the
/// envelope.
#[derive(Debug, Clone)]
pub struct DirectResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: String,
}

impl DirectResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: body.into(),
        }
    }
}

/// Shared slot a handler may write a response into.
///
/// Resolved for `response`-sourced parameters and handed to interceptors and
/// after-render hooks. When the handler returns a falsy result, the dispatch
/// pipeline sends whatever was written here instead of an envelope.
#[derive(Clone, Default)]
pub struct ResponseSlot(Arc<Mutex<Option<DirectResponse>>>);

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, response: DirectResponse) {
        *self.0.lock().unwrap() = Some(response);
    }

    #[must_use]
    pub fn is_written(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }

    pub fn take(&self) -> Option<DirectResponse> {
        self.0.lock().unwrap().take()
    }
}

impl std::fmt::Debug for ResponseSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSlot")
            .field("written", &self.is_written())
            .finish()
    }
}

/// Continuation token resolved for `next`-sourced parameters and passed to
/// hooks. Dispatch here is channel-based, so the token is inert; it exists
/// so handler signatures written against callback-style frameworks keep
/// their shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct Next;

/// Lightweight reference to the handler a dispatch resolves to; passed to
/// interceptors and after-render hooks.
#[derive(Debug, Clone)]
pub struct HandlerRef {
    pub route_id: String,
    pub controller: String,
    pub handler_name: String,
}

/// One resolved handler argument.
#[derive(Debug, Clone)]
pub enum HandlerArg {
    /// Plain resolved data (body, params, headers, session, …).
    Value(Value),
    /// The request object itself.
    Request(Box<HandlerRequest>),
    /// The response slot.
    Response(ResponseSlot),
    /// The continuation token.
    Next(Next),
    /// Explicit absent value (unknown source kinds, missing attachments).
    Absent,
}

impl HandlerArg {
    /// View the argument as JSON data; `Absent` and non-data arguments read
    /// as `Null`.
    #[must_use]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            _ => Value::Null,
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// One queued handler invocation.
pub struct Invocation {
    pub args: Vec<HandlerArg>,
    pub reply_tx: mpsc::Sender<Result<Value, HandlerError>>,
}

/// Channel sender dispatching invocations to a handler coroutine.
pub type HandlerSender = mpsc::Sender<Invocation>;

/// The wire-level outcome of a dispatch.
#[derive(Debug)]
pub enum Dispatched {
    /// JSON envelope (success or error).
    Envelope(ResponseEnvelope),
    /// Raw body with status 200.
    Raw(String),
    /// The handler (or an interceptor) owned the response; `None` means
    /// nothing was written and the transport default applies.
    Direct(Option<DirectResponse>),
}

/// Clears telemetry for a request id on scope exit, so every dispatch path
/// (success, error, short-circuit, middleware abort) leaves the store empty.
struct TelemetryGuard<'a> {
    telemetry: &'a TelemetryRecorder,
    id: RequestId,
}

impl Drop for TelemetryGuard<'_> {
    fn drop(&mut self) {
        self.telemetry.clear(self.id);
    }
}

enum Flow {
    Intercepted,
    Result(Value),
}

/// Routes requests to per-route handler coroutines and runs the dispatch
/// pipeline: route middleware, interceptors, argument resolution, handler
/// invocation, result classification, after-render hooks, telemetry.
pub struct Dispatcher {
    handlers: HashMap<String, HandlerSender>,
    hooks: HookRegistry,
    telemetry: Arc<TelemetryRecorder>,
}

impl Dispatcher {
    pub fn new(telemetry: Arc<TelemetryRecorder>) -> Self {
        Self {
            handlers: HashMap::new(),
            hooks: HookRegistry::new(),
            telemetry,
        }
    }

    #[must_use]
    pub fn telemetry(&self) -> &Arc<TelemetryRecorder> {
        &self.telemetry
    }

    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Spawn the handler coroutine for a bound route and register its
    /// sender under the route identity.
    ///
    /// Re-registering a route identity replaces the previous handler; the
    /// old sender is dropped, which closes its channel and lets the old
    /// coroutine exit.
    ///
    /// # Safety
    ///
    /// `may::coroutine::Builder::spawn` is unsafe in the `may` runtime. The
    /// caller must ensure the runtime is initialized and that this is called
    /// during startup, before the server accepts traffic.
    pub unsafe fn register_route(&mut self, entry: &Arc<RouteEntry>, controller: Arc<dyn Controller>) {
        let route_id = entry.route_id.clone();
        if let Some(old_sender) = self.handlers.remove(&route_id) {
            drop(old_sender);
            warn!(
                route_id = %route_id,
                "Replaced existing handler - old coroutine will exit"
            );
        }

        let (tx, rx) = mpsc::channel::<Invocation>();
        let handler_name = entry.handler_name.clone();
        let coroutine_route_id = route_id.clone();
        let stack_size = RuntimeConfig::from_env().stack_size;

        // SAFETY: spawn is unsafe because of the coroutine runtime's
        // requirements, not this function's logic. The closure is
        // Send + 'static, errors travel back over the reply channel, and
        // panics are caught below.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(
                        route_id = %coroutine_route_id,
                        stack_size = stack_size,
                        "Handler coroutine start"
                    );
                    for invocation in rx.iter() {
                        let Invocation { args, reply_tx } = invocation;
                        let call = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            controller.call(&handler_name, args)
                        }));
                        let reply = match call {
                            Ok(result) => result,
                            Err(panic) => {
                                let panic_message = format!("{panic:?}");
                                error!(
                                    route_id = %coroutine_route_id,
                                    panic_message = %panic_message,
                                    "Handler panicked"
                                );
                                Err(HandlerError::new(format!(
                                    "handler panicked: {panic_message}"
                                )))
                            }
                        };
                        let _ = reply_tx.send(reply);
                    }
                })
        };

        if let Err(e) = spawn_result {
            error!(
                route_id = %route_id,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine"
            );
            return;
        }

        info!(
            route_id = %route_id,
            total_handlers = self.handlers.len() + 1,
            "Handler registered"
        );
        self.handlers.insert(route_id, tx);
    }

    /// Run the dispatch pipeline for a matched route.
    ///
    /// Returns `Err` only for route-middleware failures, which belong to the
    /// transport's generic error path: no envelope is produced, the handler
    /// never runs, and after-render hooks do not fire. Every other failure
    /// is converted into a 500 envelope and returned as `Ok`.
    ///
    /// Telemetry for the request id is cleared on every exit path, as the
    /// very last action.
    pub fn dispatch(
        &self,
        route_match: &RouteMatch,
        mut req: HandlerRequest,
        ctx: &RequestContext,
    ) -> Result<Dispatched, MiddlewareError> {
        let entry = &route_match.route;
        let _telemetry_guard = TelemetryGuard {
            telemetry: &self.telemetry,
            id: ctx.request_id,
        };

        for mw in &entry.middlewares {
            if let Err(err) = mw.handle(&mut req) {
                warn!(
                    request_id = %ctx.request_id,
                    route_id = %entry.route_id,
                    error = %err,
                    "Route middleware aborted dispatch"
                );
                self.telemetry.end(SPAN_REQUEST, ctx.request_id);
                return Err(err);
            }
        }

        let slot = ResponseSlot::new();
        let next = Next;
        let handler_ref = HandlerRef {
            route_id: entry.route_id.clone(),
            controller: entry.controller.clone(),
            handler_name: entry.handler_name.clone(),
        };

        let flow = self.invoke(entry, &req, &slot, &next, &handler_ref, ctx);

        self.telemetry.end(SPAN_REQUEST, ctx.request_id);

        let dispatched = match flow {
            Ok(Flow::Intercepted) => {
                debug!(
                    request_id = %ctx.request_id,
                    route_id = %entry.route_id,
                    "Interceptor short-circuited dispatch"
                );
                Dispatched::Direct(slot.take())
            }
            Ok(Flow::Result(value)) => match classify(value) {
                Classified::Structured(data) => {
                    let envelope =
                        ResponseEnvelope::success(data, ctx, self.debug_snapshot(ctx));
                    let content = envelope.to_value();
                    self.hooks.run_after_render(
                        &entry.route_id,
                        &req,
                        &slot,
                        &next,
                        &handler_ref,
                        &content,
                    );
                    Dispatched::Envelope(envelope)
                }
                Classified::Raw(text) => {
                    let content = Value::String(text.clone());
                    self.hooks.run_after_render(
                        &entry.route_id,
                        &req,
                        &slot,
                        &next,
                        &handler_ref,
                        &content,
                    );
                    Dispatched::Raw(text)
                }
                Classified::Empty => Dispatched::Direct(slot.take()),
            },
            Err(err) => {
                error!(
                    request_id = %ctx.request_id,
                    route_id = %entry.route_id,
                    error = %err,
                    "Handler failed"
                );
                let envelope =
                    ResponseEnvelope::failure(err.message(), ctx, self.debug_snapshot(ctx));
                let content = envelope.to_value();
                self.hooks.run_after_render(
                    &entry.route_id,
                    &req,
                    &slot,
                    &next,
                    &handler_ref,
                    &content,
                );
                Dispatched::Envelope(envelope)
            }
        };

        Ok(dispatched)
        // _telemetry_guard drops here: telemetry cleared last, on all paths
    }

    fn invoke(
        &self,
        entry: &Arc<RouteEntry>,
        req: &HandlerRequest,
        slot: &ResponseSlot,
        next: &Next,
        handler_ref: &HandlerRef,
        ctx: &RequestContext,
    ) -> Result<Flow, HandlerError> {
        for interceptor in self.hooks.interceptors_for(&entry.route_id) {
            if interceptor.intercept(req, slot, next, handler_ref) {
                return Ok(Flow::Intercepted);
            }
        }

        let args = resolve_args(req, slot, next, &entry.params);

        let tx = self.handlers.get(&entry.route_id).ok_or_else(|| {
            error!(
                route_id = %entry.route_id,
                available_handlers = self.handlers.len(),
                "Handler not found"
            );
            HandlerError::new(format!("no handler registered for {}", entry.route_id))
        })?;

        info!(
            request_id = %ctx.request_id,
            route_id = %entry.route_id,
            route_hash = %entry.route_hash,
            handler_name = %entry.handler_name,
            "Request dispatched to handler"
        );

        let (reply_tx, reply_rx) = mpsc::channel();
        self.telemetry.start(SPAN_HANDLER, ctx.request_id);
        let sent = tx.send(Invocation {
            args,
            reply_tx,
        });
        let reply = match sent {
            Ok(()) => reply_rx
                .recv()
                .map_err(|_| HandlerError::new("handler stopped before replying")),
            Err(_) => Err(HandlerError::new("handler is not accepting requests")),
        };
        self.telemetry.end(SPAN_HANDLER, ctx.request_id);

        reply?.map(Flow::Result)
    }

    fn debug_snapshot(&self, ctx: &RequestContext) -> Option<Vec<crate::telemetry::SpanRecord>> {
        ctx.debug.then(|| self.telemetry.telemetry(ctx.request_id))
    }
}
