//! Per-request timing spans.
//!
//! The recorder keeps an ordered list of named spans per request id. Spans
//! are opened with [`TelemetryRecorder::start`] and closed with
//! [`TelemetryRecorder::end`]; a `start` without a matching `end` is legal
//! (the snapshot reports it without a duration), and overlapping spans with
//! the same name close last-opened-first. Entries for a request id are
//! removed with [`TelemetryRecorder::clear`]; the dispatch pipeline does
//! this unconditionally as its final action, so the store never accumulates
//! across requests.

use crate::ids::RequestId;
use dashmap::DashMap;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone)]
struct ActiveSpan {
    name: String,
    started: Instant,
    ended: Option<Instant>,
}

/// One snapshotted span, as exposed in debug envelopes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SpanRecord {
    pub name: String,
    /// Milliseconds between start and end; absent for spans still open at
    /// snapshot time.
    #[serde(rename = "durationMs", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Concurrent store of timing spans keyed by request id.
///
/// Request ids are ULIDs, unique per in-flight request, so concurrent
/// requests never collide on a key.
#[derive(Default)]
pub struct TelemetryRecorder {
    spans: DashMap<RequestId, Vec<ActiveSpan>>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a named span for the request.
    pub fn start(&self, name: &str, id: RequestId) {
        self.spans.entry(id).or_default().push(ActiveSpan {
            name: name.to_string(),
            started: Instant::now(),
            ended: None,
        });
    }

    /// Close the most recently opened span with this name that is still
    /// open. Closing a span that was never opened is a no-op.
    pub fn end(&self, name: &str, id: RequestId) {
        if let Some(mut entry) = self.spans.get_mut(&id) {
            if let Some(span) = entry
                .iter_mut()
                .rev()
                .find(|s| s.name == name && s.ended.is_none())
            {
                span.ended = Some(Instant::now());
            }
        }
    }

    /// Ordered snapshot of the request's spans.
    #[must_use]
    pub fn telemetry(&self, id: RequestId) -> Vec<SpanRecord> {
        self.spans
            .get(&id)
            .map(|entry| {
                entry
                    .iter()
                    .map(|s| SpanRecord {
                        name: s.name.clone(),
                        duration_ms: s
                            .ended
                            .map(|e| e.duration_since(s.started).as_millis() as u64),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every span recorded for the request id.
    pub fn clear(&self, id: RequestId) {
        self.spans.remove(&id);
    }

    /// Number of request ids with live entries; used by tests to assert the
    /// clear-after-dispatch invariant.
    #[must_use]
    pub fn tracked_requests(&self) -> usize {
        self.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_preserves_order_and_open_spans() {
        let recorder = TelemetryRecorder::new();
        let id = RequestId::new();
        recorder.start("Request Process", id);
        recorder.start("Controller Handler", id);
        recorder.end("Controller Handler", id);

        let spans = recorder.telemetry(id);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "Request Process");
        assert!(spans[0].duration_ms.is_none());
        assert_eq!(spans[1].name, "Controller Handler");
        assert!(spans[1].duration_ms.is_some());
    }

    #[test]
    fn overlapping_same_name_spans_close_last_opened_first() {
        let recorder = TelemetryRecorder::new();
        let id = RequestId::new();
        recorder.start("db", id);
        recorder.start("db", id);
        recorder.end("db", id);

        let spans = recorder.telemetry(id);
        assert!(spans[0].duration_ms.is_none());
        assert!(spans[1].duration_ms.is_some());
    }

    #[test]
    fn clear_removes_all_entries_for_id() {
        let recorder = TelemetryRecorder::new();
        let id = RequestId::new();
        recorder.start("Request Process", id);
        recorder.clear(id);
        assert!(recorder.telemetry(id).is_empty());
        assert_eq!(recorder.tracked_requests(), 0);
    }
}
