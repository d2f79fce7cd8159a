use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::context::RequestContext;
use crate::server::{ParsedRequest, WireResponse};

/// Passive request counters.
///
/// Tracks request count, cumulative latency, and error responses using
/// relaxed atomics: eventually consistent, never blocking a request. This
/// is coarse operational accounting; per-request spans live in the
/// [`crate::telemetry::TelemetryRecorder`].
#[derive(Default)]
pub struct RequestMetrics {
    request_count: AtomicUsize,
    error_count: AtomicUsize,
    total_latency_ns: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Mean processing time across all requests; zero when none were seen.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }
}

impl Middleware for RequestMetrics {
    fn before(&self, _ctx: &RequestContext, _req: &mut ParsedRequest) -> Option<WireResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(
        &self,
        _ctx: &RequestContext,
        _req: &ParsedRequest,
        res: &mut WireResponse,
        latency: Duration,
    ) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if res.status >= 500 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}
