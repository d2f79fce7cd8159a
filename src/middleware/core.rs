use crate::context::RequestContext;
use crate::dispatcher::HandlerRequest;
use crate::server::{ParsedRequest, WireResponse};
use std::time::Duration;
use thiserror::Error;

/// Failure signalled by a route middleware.
///
/// Middleware failures belong to the transport's generic error path: the
/// handler never runs, no envelope is produced, and the status/message here
/// become the transport error body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MiddlewareError {
    status: u16,
    message: String,
}

impl MiddlewareError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Route-scoped middleware, declared per route descriptor and run strictly
/// in declaration order before interceptors and the handler.
pub trait RouteMiddleware: Send + Sync {
    fn handle(&self, req: &mut HandlerRequest) -> Result<(), MiddlewareError>;
}

/// Adapter-global middleware, installed once at initialization and applied
/// to every request, including those that never match a route.
///
/// `before` may answer the request outright (e.g. a CORS preflight) by
/// returning a response; `after` observes and mutates the outgoing response.
pub trait Middleware: Send + Sync {
    fn before(&self, _ctx: &RequestContext, _req: &mut ParsedRequest) -> Option<WireResponse> {
        None
    }

    fn after(
        &self,
        _ctx: &RequestContext,
        _req: &ParsedRequest,
        _res: &mut WireResponse,
        _latency: Duration,
    ) {
    }
}
