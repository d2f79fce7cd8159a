use crate::ids::{route_hash, route_key, RequestId, ResponseNonce};
use http::Method;
use std::time::Instant;

/// Ephemeral per-request state, created when a request arrives and discarded
/// after the response is written.
///
/// Carries the request id (created at the start of the first middleware
/// stage), the per-response CSP nonce, and the route content hash used as the
/// telemetry correlation key. Telemetry recorded under [`RequestContext::id`]
/// is cleared by the dispatch pipeline before the context is dropped.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request id (adopted from `x-request-id` when valid).
    pub request_id: RequestId,
    /// Per-response nonce for CSP injection.
    pub nonce: ResponseNonce,
    /// Content hash of `method::path`, correlating telemetry across systems.
    pub route_hash: String,
    /// Whether the request asked for debug output (`?debug=true`).
    pub debug: bool,
    /// Instant the request entered the adapter; basis for `processingTime`.
    pub started: Instant,
}

impl RequestContext {
    pub fn new(request_id: RequestId, method: &Method, path: &str, debug: bool) -> Self {
        Self {
            request_id,
            nonce: ResponseNonce::new(),
            route_hash: route_hash(&route_key(method, path)),
            debug,
            started: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the request entered the adapter.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
