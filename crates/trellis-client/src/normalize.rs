//! Error normalization
//!
//! Maps any failure value - a raw transport error or a structured server
//! payload - into the normalized taxonomy. Normalization is idempotent: an
//! already-normalized error passes through the pipeline untouched.

use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestContext;
use crate::correlation;
use crate::error::{ClientError, NetworkKind};
use crate::metadata::{self, MetaHandle, RequestMetadata};
use crate::transport::{TransportError, TransportErrorKind, TransportResponse};

fn attach_meta(ctx: &RequestContext, cause: Option<String>) -> Arc<MetaHandle> {
    metadata::attach(RequestMetadata {
        method: ctx.method.clone(),
        url: ctx.url.clone(),
        start_time_ms: ctx.start_time_ms,
        correlation_id: ctx.correlation_id.clone(),
        cause,
    })
}

/// Build an `Api` error from a structured server payload
/// `{message, status, code, details, traceId}`.
///
/// The message is copied verbatim when the payload supplied a string; a
/// structured message is rendered as its exact JSON text, so `.message()` is
/// always a string for any caller. `traceId` maps to the error's correlation
/// id, falling back to `fallback_correlation` when absent.
pub fn from_payload(
    http_status: u16,
    payload: &Value,
    fallback_correlation: Option<&str>,
) -> ClientError {
    let message = match payload.get("message") {
        Some(Value::String(text)) => text.clone(),
        Some(value) if !value.is_null() => {
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
        }
        _ => format!("request failed with status {http_status}"),
    };
    let status = payload
        .get("status")
        .and_then(|s| s.as_u64())
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(http_status);
    let code = payload
        .get("code")
        .and_then(|c| c.as_str())
        .map(str::to_string);
    let details = payload.get("details").cloned().filter(|d| !d.is_null());
    let correlation_id = payload
        .get("traceId")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .or_else(|| fallback_correlation.map(str::to_string));

    ClientError::Api {
        message,
        status,
        code,
        details,
        correlation_id,
        meta: None,
    }
}

/// Normalize a non-2xx transport response into an `Api` error.
///
/// Correlation preference: the payload's `traceId`, then a server-echoed
/// response header, then the request's own correlation id. The raw body is
/// retained only in the out-of-band metadata table.
pub fn from_response(response: &TransportResponse, ctx: &RequestContext) -> ClientError {
    let payload = serde_json::from_str::<Value>(&response.body).unwrap_or(Value::Null);
    let echoed = correlation::extract_from_response(&response.headers);
    let fallback = echoed.as_deref().or(ctx.correlation_id.as_deref());

    let error = from_payload(response.status, &payload, fallback);
    let cause = if response.body.is_empty() {
        None
    } else {
        Some(response.body.clone())
    };
    match error {
        ClientError::Api {
            message,
            status,
            code,
            details,
            correlation_id,
            ..
        } => ClientError::Api {
            message,
            status,
            code,
            details,
            correlation_id,
            meta: Some(attach_meta(ctx, cause)),
        },
        other => other,
    }
}

/// Normalize a malformed body on a successful response into a `Network`
/// error.
///
/// The error carries the request's correlation id and a metadata record whose
/// cause is the undecodable body, so the failure is diagnosable like any
/// other.
pub fn from_decode_failure(
    parse_error: &serde_json::Error,
    response: &TransportResponse,
    ctx: &RequestContext,
) -> ClientError {
    ClientError::Network {
        kind: NetworkKind::Other,
        message: format!("failed to decode response body: {parse_error}"),
        correlation_id: ctx.correlation_id.clone(),
        meta: Some(attach_meta(ctx, Some(response.body.clone()))),
    }
}

/// Normalize a transport-level failure into a `Network` error.
///
/// Connectivity failures and timeouts get fixed messages so callers can
/// present them uniformly; anything else keeps the original message. The raw
/// failure text is retained only as out-of-band metadata.
pub fn from_transport(error: &TransportError, ctx: &RequestContext) -> ClientError {
    let (kind, message) = match error.kind {
        TransportErrorKind::Connect => {
            (NetworkKind::ConnectionFailed, "connection failed".to_string())
        }
        TransportErrorKind::TimedOut => (
            NetworkKind::CancelledOrTimedOut,
            "request was cancelled or timed out".to_string(),
        ),
        TransportErrorKind::Other => {
            let message = if error.message.is_empty() {
                "an unexpected error occurred".to_string()
            } else {
                error.message.clone()
            };
            (NetworkKind::Other, message)
        }
    };

    ClientError::Network {
        kind,
        message,
        correlation_id: ctx.correlation_id.clone(),
        meta: Some(attach_meta(ctx, Some(error.message.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> RequestContext {
        let mut ctx = RequestContext::new("GET", "https://api.example.com/v1/things");
        ctx.correlation_id = Some("ctx-corr".to_string());
        ctx
    }

    #[test]
    fn test_structured_message_becomes_exact_json_text() {
        let payload = json!({
            "message": {"foo": "bar", "baz": 42},
            "status": 400,
            "code": "TEST_CODE",
            "details": {"detail": "info"},
            "traceId": "trace-123",
        });
        let error = from_payload(400, &payload, None);
        assert_eq!(
            error.message(),
            serde_json::to_string(&json!({"foo": "bar", "baz": 42})).unwrap()
        );
        assert_eq!(error.status(), Some(400));
        assert_eq!(error.code(), "TEST_CODE");
        assert_eq!(error.details(), Some(&json!({"detail": "info"})));
        assert_eq!(error.correlation_id(), Some("trace-123"));
        assert_eq!(error.trace_id(), Some("trace-123"));
    }

    #[test]
    fn test_string_message_verbatim() {
        let payload = json!({
            "message": "Simple error",
            "status": 404,
            "code": "NOT_FOUND",
            "details": null,
            "traceId": "trace-456",
        });
        let error = from_payload(404, &payload, None);
        assert_eq!(error.message(), "Simple error");
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.code(), "NOT_FOUND");
        assert!(error.details().is_none());
        assert_eq!(error.correlation_id(), Some("trace-456"));
    }

    #[test]
    fn test_missing_message_falls_back_to_status() {
        let payload = json!({"code": "X"});
        let error = from_payload(502, &payload, None);
        assert_eq!(error.message(), "request failed with status 502");
        assert_eq!(error.status(), Some(502));
    }

    #[test]
    fn test_trace_id_preferred_over_fallback() {
        let payload = json!({"message": "m", "traceId": "payload-trace"});
        let error = from_payload(500, &payload, Some("fallback"));
        assert_eq!(error.correlation_id(), Some("payload-trace"));

        let payload = json!({"message": "m"});
        let error = from_payload(500, &payload, Some("fallback"));
        assert_eq!(error.correlation_id(), Some("fallback"));
    }

    #[test]
    fn test_out_of_range_payload_status_falls_back() {
        let payload = json!({"message": "m", "status": 70_000});
        let error = from_payload(502, &payload, None);
        assert_eq!(error.status(), Some(502));
    }

    #[test]
    fn test_decode_failure_keeps_context() {
        let response = TransportResponse {
            status: 200,
            headers: HashMap::new(),
            body: "not json".to_string(),
        };
        let parse_error = serde_json::from_str::<Value>(&response.body).unwrap_err();
        let error = from_decode_failure(&parse_error, &response, &ctx());

        assert!(error.message().starts_with("failed to decode response body"));
        assert_eq!(error.correlation_id(), Some("ctx-corr"));
        let diagnostics = error.diagnostics().unwrap();
        assert_eq!(diagnostics.cause.as_deref(), Some("not json"));
    }

    #[test]
    fn test_from_response_uses_echoed_header() {
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), "echoed".to_string());
        let response = TransportResponse {
            status: 500,
            headers,
            body: r#"{"message": "server blew up"}"#.to_string(),
        };
        let error = from_response(&response, &ctx());
        assert_eq!(error.correlation_id(), Some("echoed"));
        assert_eq!(error.message(), "server blew up");
    }

    #[test]
    fn test_from_response_falls_back_to_context() {
        let response = TransportResponse {
            status: 500,
            headers: HashMap::new(),
            body: String::new(),
        };
        let error = from_response(&response, &ctx());
        assert_eq!(error.correlation_id(), Some("ctx-corr"));
    }

    #[test]
    fn test_connect_failure_message() {
        let transport = TransportError::new(TransportErrorKind::Connect, "tcp connect error");
        let error = from_transport(&transport, &ctx());
        assert_eq!(error.message(), "connection failed");
        assert_eq!(error.correlation_id(), Some("ctx-corr"));
        let diagnostics = error.diagnostics().unwrap();
        assert_eq!(diagnostics.cause.as_deref(), Some("tcp connect error"));
    }

    #[test]
    fn test_timeout_message() {
        let transport = TransportError::new(TransportErrorKind::TimedOut, "deadline elapsed");
        let error = from_transport(&transport, &ctx());
        assert_eq!(error.message(), "request was cancelled or timed out");
    }

    #[test]
    fn test_unclassified_keeps_original_message() {
        let transport = TransportError::new(TransportErrorKind::Other, "body decode stalled");
        let error = from_transport(&transport, &ctx());
        assert_eq!(error.message(), "body decode stalled");

        let transport = TransportError::new(TransportErrorKind::Other, "");
        let error = from_transport(&transport, &ctx());
        assert_eq!(error.message(), "an unexpected error occurred");
    }
}
