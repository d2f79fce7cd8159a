//! Pre-handler interceptors and post-render hooks, keyed by route identity.
//!
//! Interceptors run after route middleware and before argument resolution.
//! Returning `true` is a short-circuit signal: dispatch stops immediately,
//! the handler is never invoked, and the adapter emits no response of its
//! own: the interceptor either wrote one through the [`ResponseSlot`] or
//! intentionally left the transport default.
//!
//! After-render hooks observe the final content (envelope or raw body) of
//! both success and error branches, in registration order.
//!
//! Neither kind of hook has a failure channel: a hook that panics is not
//! caught here and unwinds through the dispatch pipeline. That is a known
//! sharp edge, kept deliberately; silently swallowing hook failures would
//! hide real bugs.

use crate::dispatcher::{HandlerRef, HandlerRequest, Next, ResponseSlot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Pre-handler hook capable of short-circuiting dispatch.
pub trait Interceptor: Send + Sync {
    /// Return `true` to stop dispatch without invoking the handler.
    fn intercept(
        &self,
        req: &HandlerRequest,
        res: &ResponseSlot,
        next: &Next,
        handler: &HandlerRef,
    ) -> bool;
}

/// Post-handler hook observing the final response content.
pub trait AfterRender: Send + Sync {
    fn after_render(
        &self,
        req: &HandlerRequest,
        res: &ResponseSlot,
        next: &Next,
        handler: &HandlerRef,
        content: &Value,
    );
}

/// Registered hooks, grouped by route identity (`method::path`, lower-case).
#[derive(Default)]
pub struct HookRegistry {
    interceptors: HashMap<String, Vec<Arc<dyn Interceptor>>>,
    after_render: HashMap<String, Vec<Arc<dyn AfterRender>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor for a route identity. Registration order is
    /// execution order.
    pub fn register_interceptor(&mut self, route_id: &str, hook: Arc<dyn Interceptor>) {
        self.interceptors
            .entry(route_id.to_lowercase())
            .or_default()
            .push(hook);
    }

    /// Register an after-render hook for a route identity.
    pub fn register_after_render(&mut self, route_id: &str, hook: Arc<dyn AfterRender>) {
        self.after_render
            .entry(route_id.to_lowercase())
            .or_default()
            .push(hook);
    }

    #[must_use]
    pub fn interceptors_for(&self, route_id: &str) -> &[Arc<dyn Interceptor>] {
        self.interceptors
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Run every after-render hook registered for the route, in order.
    pub fn run_after_render(
        &self,
        route_id: &str,
        req: &HandlerRequest,
        res: &ResponseSlot,
        next: &Next,
        handler: &HandlerRef,
        content: &Value,
    ) {
        if let Some(hooks) = self.after_render.get(route_id) {
            for hook in hooks {
                hook.after_render(req, res, next, handler, content);
            }
        }
    }
}
