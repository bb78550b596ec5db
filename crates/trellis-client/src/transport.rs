//! Transport seam between the pipeline and the wire
//!
//! The interceptor pipeline is written against the [`Transport`] trait; the
//! actual socket/HTTP work is an external capability the pipeline wraps.
//! [`ReqwestTransport`] is the default implementation. Tests inject mock
//! transports to drive every failure path deterministically.

use std::collections::HashMap;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::context::{RequestBody, RequestContext};

/// Coarse classification of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Unreachable host, DNS failure, or connection refused
    Connect,
    /// The attempt was cancelled or exceeded its time budget
    TimedOut,
    /// Anything else the transport could not classify
    Other,
}

/// Failure raised by the transport before a response was produced
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Raw response handed to the response interceptor chain
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lower-cased
    pub headers: HashMap<String, String>,
    /// Response body text
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request attempt against the wire.
pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

/// Default transport backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with a default reqwest client.
    ///
    /// No client-level timeout is configured; the orchestrator applies its own
    /// per-attempt timeout around `execute`.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            TransportError::new(
                TransportErrorKind::Other,
                format!("failed to build HTTP client: {e}"),
            )
        })?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify(error: reqwest::Error) -> TransportError {
        let kind = if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_timeout() {
            TransportErrorKind::TimedOut
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, error.to_string())
    }
}

impl Transport for ReqwestTransport {
    fn execute<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(ctx.method.as_bytes()).map_err(|_| {
                TransportError::new(
                    TransportErrorKind::Other,
                    format!("invalid HTTP method: {}", ctx.method),
                )
            })?;

            let mut request = self.client.request(method, &ctx.url);
            for (name, value) in &ctx.headers {
                request = request.header(name, value);
            }
            match &ctx.body {
                Some(RequestBody::Json(value)) => {
                    request = request.json(value);
                }
                Some(RequestBody::Bytes { data, content_type }) => {
                    request = request
                        .header(reqwest::header::CONTENT_TYPE, content_type)
                        .body(data.clone());
                }
                None => {}
            }

            let response = request.send().await.map_err(Self::classify)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(Self::classify)?;

            Ok(TransportResponse {
                status,
                headers,
                body,
            })
        })
    }
}
