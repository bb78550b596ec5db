//! Request orchestrator
//!
//! `ApiClient` drives the full pipeline for each call: build a context, run
//! the request interceptor chain, execute transport under a per-attempt
//! timeout, run the response chain, and consult retry state on failure. A
//! retried attempt reuses the correlation id of the first and rebuilds
//! everything else fresh.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::context::{RequestBody, RequestContext};
use crate::error::{ClientError, Result};
use crate::interceptor::request::RequestInterceptorChain;
use crate::interceptor::response::{AttemptFailure, ResponseInterceptorChain};
use crate::retry::{RetryDecision, RetryHandler, RetryPolicy};
use crate::transport::{Transport, TransportError, TransportErrorKind, TransportResponse};

/// Client-wide configuration.
///
/// `timeout_ms` bounds a single attempt; a fully retried request can take up
/// to `retry.max_attempts` timeouts plus the backoff delays between them.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub enable_retry: bool,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: 10_000,
            enable_retry: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-call options.
///
/// Retries require opting in via `idempotent`; the default treats every call
/// as unsafe to replay.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Marks the call safe to replay after a retryable failure.
    pub idempotent: bool,
    /// Per-attempt timeout override, milliseconds.
    pub timeout_ms: Option<u64>,
}

impl RequestOptions {
    /// Options marked safe to retry.
    pub fn idempotent() -> Self {
        Self {
            idempotent: true,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Correlation-aware HTTP API client.
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    request_chain: Arc<RequestInterceptorChain>,
    response_chain: Arc<ResponseInterceptorChain>,
}

impl ApiClient {
    /// Start building a client for the given base URL.
    pub fn builder(base_url: impl Into<String>) -> crate::builder::ClientBuilder {
        crate::builder::ClientBuilder::new(base_url)
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        request_chain: Arc<RequestInterceptorChain>,
        response_chain: Arc<ResponseInterceptorChain>,
    ) -> Self {
        Self {
            config,
            transport,
            request_chain,
            response_chain,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Verb surface. Bodyless verbs take only a path; `_with` variants accept
    // per-call options.

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with(path, RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T> {
        let (ctx, response) = self.execute("GET", path, None, &opts).await?;
        decode(&ctx, &response)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.post_with(path, body, RequestOptions::default()).await
    }

    pub async fn post_with<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOptions,
    ) -> Result<T> {
        let body = json_body(body)?;
        let (ctx, response) = self.execute("POST", path, Some(body), &opts).await?;
        decode(&ctx, &response)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.put_with(path, body, RequestOptions::default()).await
    }

    pub async fn put_with<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOptions,
    ) -> Result<T> {
        let body = json_body(body)?;
        let (ctx, response) = self.execute("PUT", path, Some(body), &opts).await?;
        decode(&ctx, &response)
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.patch_with(path, body, RequestOptions::default()).await
    }

    pub async fn patch_with<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOptions,
    ) -> Result<T> {
        let body = json_body(body)?;
        let (ctx, response) = self.execute("PATCH", path, Some(body), &opts).await?;
        decode(&ctx, &response)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.delete_with(path, RequestOptions::default()).await
    }

    pub async fn delete_with<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T> {
        let (ctx, response) = self.execute("DELETE", path, None, &opts).await?;
        decode(&ctx, &response)
    }

    /// HEAD request; resolves to the response status code.
    pub async fn head(&self, path: &str) -> Result<u16> {
        let (_, response) = self
            .execute("HEAD", path, None, &RequestOptions::default())
            .await?;
        Ok(response.status)
    }

    /// OPTIONS request; resolves to the response status code.
    pub async fn options(&self, path: &str) -> Result<u16> {
        let (_, response) = self
            .execute("OPTIONS", path, None, &RequestOptions::default())
            .await?;
        Ok(response.status)
    }

    /// POST raw bytes with an explicit content type.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<T> {
        self.upload_with(path, data, content_type, RequestOptions::default())
            .await
    }

    pub async fn upload_with<T: DeserializeOwned>(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
        opts: RequestOptions,
    ) -> Result<T> {
        let body = RequestBody::Bytes {
            data,
            content_type: content_type.to_string(),
        };
        let (ctx, response) = self.execute("POST", path, Some(body), &opts).await?;
        decode(&ctx, &response)
    }

    /// Run one logical request through the full pipeline, retrying per
    /// policy. Resolves with the winning attempt's context alongside the
    /// response, so post-pipeline failures keep its correlation id.
    async fn execute(
        &self,
        method: &str,
        path: &str,
        body: Option<RequestBody>,
        opts: &RequestOptions,
    ) -> Result<(RequestContext, TransportResponse)> {
        let url = self.join_url(path)?;
        let timeout = Duration::from_millis(opts.timeout_ms.unwrap_or(self.config.timeout_ms));
        let mut handler = RetryHandler::new(self.config.retry.clone());
        let mut shared_correlation: Option<String> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut ctx = RequestContext::new(method, url.clone());
            ctx.body = body.clone();
            ctx.correlation_id = shared_correlation.clone();
            ctx.retry_count = attempt - 1;

            // Setup failures surface immediately and are never retried.
            let ctx = self.request_chain.apply(ctx).await?;
            shared_correlation = ctx.correlation_id.clone();

            let outcome = match tokio::time::timeout(timeout, self.transport.execute(&ctx)).await {
                Err(_elapsed) => Err(AttemptFailure::Transport(TransportError::new(
                    TransportErrorKind::TimedOut,
                    format!("attempt exceeded {}ms", timeout.as_millis()),
                ))),
                Ok(Ok(response)) if response.is_success() => Ok(response),
                Ok(Ok(response)) => Err(AttemptFailure::HttpStatus(response)),
                Ok(Err(error)) => Err(AttemptFailure::Transport(error)),
            };

            match self.response_chain.process(&ctx, outcome) {
                Ok(response) => return Ok((ctx, response)),
                Err(error) => {
                    if self.config.enable_retry {
                        if let RetryDecision::Retry { delay } =
                            handler.should_retry(&error, opts.idempotent)
                        {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                correlation_id = shared_correlation.as_deref().unwrap_or(""),
                                error = %error,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Resolve a path against the configured base URL. Absolute URLs pass
    /// through after validation.
    fn join_url(&self, path: &str) -> Result<String> {
        let resolved = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Url::parse(&resolved)
            .map(|url| url.to_string())
            .map_err(|e| ClientError::RequestSetup {
                message: format!("invalid request URL '{resolved}': {e}"),
                correlation_id: None,
            })
    }
}

fn json_body<B: Serialize>(body: &B) -> Result<RequestBody> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| ClientError::RequestSetup {
            message: format!("failed to serialize request body: {e}"),
            correlation_id: None,
        })
}

/// Decode a successful response body as JSON. Empty bodies decode as `null`,
/// so callers expecting `Value` or `Option<T>` see an absent payload rather
/// than a parse failure. A malformed body normalizes with the request's
/// correlation id and diagnostics attached.
fn decode<T: DeserializeOwned>(ctx: &RequestContext, response: &TransportResponse) -> Result<T> {
    let text = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(text).map_err(|e| {
        tracing::warn!(
            method = %ctx.method,
            url = %ctx.url,
            status = response.status,
            elapsed_ms = ctx.elapsed_ms().unwrap_or(0),
            correlation_id = ctx.correlation_id.as_deref().unwrap_or(""),
            error = %e,
            "response body decode failed"
        );
        crate::normalize::from_decode_failure(&e, response, ctx)
    })
}
