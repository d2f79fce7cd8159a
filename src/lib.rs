//! # Gantry
//!
//! **Gantry** binds controller/route metadata onto the
//! [`may_minihttp`](https://docs.rs/may_minihttp) HTTP server, running on the
//! `may` coroutine runtime.
//!
//! ## Overview
//!
//! A host application describes its endpoints as controller descriptors:
//! a route prefix, statically declared dependency keys, and per-route
//! metadata (method, sub path, handler name, parameter bindings, route
//! middleware). At startup the adapter turns that registry into a dispatch
//! table; at request time it resolves handler arguments from heterogeneous
//! request sources, runs interceptor and after-render hooks in a defined
//! order, records per-request timing spans, and wraps results in a uniform
//! success/error envelope.
//!
//! ## Architecture
//!
//! - **[`meta`]** - controller/route/parameter descriptors
//! - **[`registry`]** - controller registry, typed provider map
//! - **[`binder`]** - fail-fast construction and ordered route registration
//! - **[`router`]** - first-registered-wins route table
//! - **[`dispatcher`]** - handler coroutines and the dispatch pipeline
//! - **[`resolver`]** - positional argument resolution
//! - **[`interceptor`]** - short-circuiting pre-handler hooks, after-render hooks
//! - **[`telemetry`]** - per-request timing spans
//! - **[`middleware`]** - global and route-scoped middleware (security headers, CORS shim, metrics)
//! - **[`server`]** - `may_minihttp` glue and the server lifecycle
//! - **[`adapter`]** - top-level orchestration
//!
//! ### Request flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as may_minihttp
//!     participant Service as AppService
//!     participant Router
//!     participant Dispatcher
//!     participant Handler as Handler (coroutine)
//!
//!     Client->>Server: HTTP request
//!     Server->>Service: call(req, res)
//!     Service->>Service: parse, mint RequestContext
//!     Service->>Service: global middleware (before)
//!     Service->>Router: route(method, path)
//!     Router-->>Service: RouteMatch
//!     Service->>Dispatcher: dispatch(match, request, ctx)
//!     Dispatcher->>Dispatcher: route middleware, interceptors
//!     Dispatcher->>Dispatcher: resolve arguments
//!     Dispatcher->>Handler: Invocation via channel
//!     Handler-->>Dispatcher: Result<Value, HandlerError>
//!     Dispatcher->>Dispatcher: classify, envelope, after-render
//!     Dispatcher-->>Service: Dispatched
//!     Service->>Service: global middleware (after)
//!     Service-->>Client: response
//! ```
//!
//! ## Dispatch semantics
//!
//! Three extension points with different timing and failure behavior:
//! route **middleware** can abort before any handler-specific cost and its
//! failures are transport-level errors; **interceptors** observe the request
//! with the resolved handler reference and may short-circuit silently;
//! **after-render hooks** observe the final content of both success and
//! error branches. Handler failures (including panics) become a 500 envelope
//! and never cross requests. Telemetry for a request id is cleared
//! unconditionally when dispatch finishes, on every path.
//!
//! ## Runtime considerations
//!
//! Gantry runs on the `may` coroutine runtime, not tokio. Handlers execute
//! in coroutines sized by `GANTRY_STACK_SIZE` (decimal or `0x…` hex, default
//! 64 KB); blocking work inside handlers should use `may`'s facilities.
//! Shutdown is a hard stop: [`server::ServerLifecycle::close`] destroys
//! tracked connections and cancels the server coroutine without draining
//! in-flight requests.

pub mod adapter;
pub mod binder;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod ids;
pub mod interceptor;
pub mod meta;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod telemetry;

pub use adapter::Adapter;
pub use config::Config;
pub use context::RequestContext;
pub use ids::{RequestId, ResponseNonce};
pub use meta::{ControllerDescriptor, ParamDescriptor, ParamSource, RouteDescriptor};
pub use registry::{Controller, ControllerRegistry, HandlerError, ProviderMap};
pub use telemetry::TelemetryRecorder;
