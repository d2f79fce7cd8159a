use crate::context::RequestContext;
use crate::telemetry::SpanRecord;
use serde::Serialize;
use serde_json::Value;

/// Fallback for errors that carry no message of their own.
const GENERIC_ERROR_MESSAGE: &str = "Internal server error";

/// The uniform success/error response wrapper.
///
/// Exactly one envelope is produced per request that reaches the handler
/// path: success or error, never both. `requestId` and `telemetry` are only
/// present when the request asked for debug output; error envelopes never
/// carry stack traces.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub status: u16,
    #[serde(rename = "processingTime")]
    pub processing_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Vec<SpanRecord>>,
}

impl ResponseEnvelope {
    pub fn success(
        data: Value,
        ctx: &RequestContext,
        telemetry: Option<Vec<SpanRecord>>,
    ) -> Self {
        Self {
            status: 200,
            processing_time: ctx.elapsed_ms(),
            data: Some(data),
            message: None,
            request_id: ctx.debug.then(|| ctx.request_id.to_string()),
            telemetry,
        }
    }

    pub fn failure(
        message: &str,
        ctx: &RequestContext,
        telemetry: Option<Vec<SpanRecord>>,
    ) -> Self {
        let message = if message.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message.to_string()
        };
        Self {
            status: 500,
            processing_time: ctx.elapsed_ms(),
            data: None,
            message: Some(message),
            request_id: ctx.debug.then(|| ctx.request_id.to_string()),
            telemetry,
        }
    }

    /// The envelope as a JSON value; this is also the `content` handed to
    /// after-render hooks.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// How a handler result reaches the wire.
#[derive(Debug)]
pub(crate) enum Classified {
    /// Structured result: wrapped in a JSON envelope with status 200.
    Structured(Value),
    /// Other truthy result: sent as a raw body with status 200.
    Raw(String),
    /// Falsy result: no body; the handler owned the response.
    Empty,
}

/// Classify a handler result.
///
/// Objects and arrays are structured. Non-empty strings, numbers and `true`
/// are truthy raw bodies. `Null`, `false` and the empty string are falsy:
/// nothing is sent on the handler's behalf.
pub(crate) fn classify(value: Value) -> Classified {
    match value {
        Value::Object(_) | Value::Array(_) => Classified::Structured(value),
        Value::String(s) => {
            if s.is_empty() {
                Classified::Empty
            } else {
                Classified::Raw(s)
            }
        }
        Value::Number(n) => Classified::Raw(n.to_string()),
        Value::Bool(true) => Classified::Raw("true".to_string()),
        Value::Bool(false) | Value::Null => Classified::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RequestId;
    use http::Method;
    use serde_json::json;

    fn ctx(debug: bool) -> RequestContext {
        RequestContext::new(RequestId::new(), &Method::GET, "/items", debug)
    }

    #[test]
    fn success_envelope_omits_debug_fields_by_default() {
        let envelope = ResponseEnvelope::success(json!({"ok": true}), &ctx(false), None);
        let value = envelope.to_value();
        assert_eq!(value["status"], 200);
        assert_eq!(value["data"]["ok"], true);
        assert!(value.get("requestId").is_none());
        assert!(value.get("telemetry").is_none());
        assert!(value.get("message").is_none());
    }

    #[test]
    fn failure_envelope_uses_generic_message_when_absent() {
        let envelope = ResponseEnvelope::failure("", &ctx(false), None);
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.message.as_deref(), Some("Internal server error"));
    }

    #[test]
    fn debug_envelope_carries_request_id() {
        let envelope = ResponseEnvelope::failure("boom", &ctx(true), Some(Vec::new()));
        let value = envelope.to_value();
        assert_eq!(value["message"], "boom");
        assert!(value.get("requestId").is_some());
        assert!(value["telemetry"].is_array());
    }

    #[test]
    fn classification_rules() {
        assert!(matches!(
            classify(json!({"a": 1})),
            Classified::Structured(_)
        ));
        assert!(matches!(classify(json!([1, 2])), Classified::Structured(_)));
        assert!(matches!(classify(json!("hello")), Classified::Raw(_)));
        assert!(matches!(classify(json!(42)), Classified::Raw(_)));
        assert!(matches!(classify(json!(true)), Classified::Raw(_)));
        assert!(matches!(classify(json!(false)), Classified::Empty));
        assert!(matches!(classify(json!("")), Classified::Empty));
        assert!(matches!(classify(Value::Null), Classified::Empty));
    }
}
