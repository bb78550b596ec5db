//! Per-attempt request context
//!
//! A `RequestContext` is created fresh per call, flows through the request
//! interceptor chain, is consumed by transport, and is discarded after the
//! response chain completes. A retried attempt gets a new context sharing the
//! same correlation id, with `retry_count` incremented.

use std::collections::HashMap;

use serde_json::Value;

/// Body of an outgoing request
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON payload, encoded by the transport
    Json(Value),
    /// Raw bytes with an explicit content type (uploads)
    Bytes { data: Vec<u8>, content_type: String },
}

/// Mutable state for one logical call attempt
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method name, upper case
    pub method: String,
    /// Fully resolved request URL
    pub url: String,
    /// Outgoing headers
    pub headers: HashMap<String, String>,
    /// Request body, if any
    pub body: Option<RequestBody>,
    /// Correlation id; assigned once by the correlation injector and never
    /// reassigned afterwards
    pub correlation_id: Option<String>,
    /// Attempt start time, epoch milliseconds
    pub start_time_ms: Option<i64>,
    /// Zero-based count of retries preceding this attempt
    pub retry_count: u32,
}

impl RequestContext {
    /// Create a fresh context for a first attempt.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            correlation_id: None,
            start_time_ms: None,
            retry_count: 0,
        }
    }

    /// Attach a body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Set an outgoing header, replacing any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Milliseconds elapsed since the attempt started, if a start time was
    /// recorded.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.start_time_ms
            .map(|start| chrono::Utc::now().timestamp_millis() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context() {
        let ctx = RequestContext::new("GET", "https://api.example.com/v1/things");
        assert_eq!(ctx.method, "GET");
        assert!(ctx.correlation_id.is_none());
        assert!(ctx.start_time_ms.is_none());
        assert_eq!(ctx.retry_count, 0);
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut ctx = RequestContext::new("GET", "https://api.example.com");
        ctx.set_header("X-Request-ID", "abc");
        assert_eq!(ctx.header("x-request-id"), Some("abc"));
        assert_eq!(ctx.header("X-REQUEST-ID"), Some("abc"));
        assert_eq!(ctx.header("x-other"), None);
    }

    #[test]
    fn test_elapsed_requires_start_time() {
        let mut ctx = RequestContext::new("GET", "https://api.example.com");
        assert!(ctx.elapsed_ms().is_none());
        ctx.start_time_ms = Some(chrono::Utc::now().timestamp_millis() - 5);
        assert!(ctx.elapsed_ms().unwrap() >= 5);
    }
}
