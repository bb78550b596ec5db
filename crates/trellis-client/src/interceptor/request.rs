//! Request interceptor chain
//!
//! Interceptors run strictly in registration order; each may suspend and must
//! fully complete before the next begins. If any interceptor fails, the chain
//! aborts immediately: no further interceptors run, transport is never
//! invoked, and the failure surfaces as a `RequestSetup` error.

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::auth::TokenSupplier;
use crate::context::RequestContext;
use crate::correlation::{self, CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
use crate::error::ClientError;

/// Failure raised by a request interceptor, before any network attempt
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SetupError {
    pub message: String,
}

impl SetupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Observes or transforms an outgoing request context.
pub trait RequestInterceptor: Send + Sync {
    /// Name used in logs and setup-error messages.
    fn name(&self) -> &'static str;

    /// Transform the context. Errors abort the chain.
    fn apply<'a>(&'a self, ctx: RequestContext)
        -> BoxFuture<'a, Result<RequestContext, SetupError>>;
}

/// Ordered request pipeline.
pub struct RequestInterceptorChain {
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl RequestInterceptorChain {
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor; execution follows registration order.
    pub fn push(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain sequentially. The first failure aborts the remainder and
    /// surfaces as a `RequestSetup` error carrying whatever correlation id was
    /// assigned before the failing interceptor ran.
    pub async fn apply(&self, mut ctx: RequestContext) -> Result<RequestContext, ClientError> {
        for interceptor in &self.interceptors {
            let correlation_id = ctx.correlation_id.clone();
            ctx = match interceptor.apply(ctx).await {
                Ok(next) => next,
                Err(error) => {
                    tracing::warn!(
                        interceptor = interceptor.name(),
                        error = %error,
                        "request interceptor failed; aborting before transport"
                    );
                    return Err(ClientError::RequestSetup {
                        message: format!("{}: {}", interceptor.name(), error.message),
                        correlation_id,
                    });
                }
            };
        }
        Ok(ctx)
    }
}

impl Default for RequestInterceptorChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Assigns a correlation id (if the context lacks one), mirrors it into the
/// `X-Request-ID` and `X-Correlation-ID` headers, and records the attempt
/// start time.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationInjector;

impl RequestInterceptor for CorrelationInjector {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn apply<'a>(
        &'a self,
        mut ctx: RequestContext,
    ) -> BoxFuture<'a, Result<RequestContext, SetupError>> {
        Box::pin(async move {
            let id = ctx
                .correlation_id
                .get_or_insert_with(correlation::generate)
                .clone();
            ctx.set_header(REQUEST_ID_HEADER, id.clone());
            ctx.set_header(CORRELATION_ID_HEADER, id);
            ctx.start_time_ms = Some(chrono::Utc::now().timestamp_millis());
            Ok(ctx)
        })
    }
}

/// Sets `Authorization: Bearer <token>` from an asynchronous token supplier.
///
/// A failed token lookup is logged and the request continues WITHOUT the
/// header: an unauthenticated request still reaches the server and triggers
/// its 401, which the response chain handles, instead of failing locally.
pub struct AuthInjector {
    supplier: Arc<dyn TokenSupplier>,
}

impl AuthInjector {
    pub fn new(supplier: Arc<dyn TokenSupplier>) -> Self {
        Self { supplier }
    }
}

impl RequestInterceptor for AuthInjector {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn apply<'a>(
        &'a self,
        mut ctx: RequestContext,
    ) -> BoxFuture<'a, Result<RequestContext, SetupError>> {
        Box::pin(async move {
            match self.supplier.token().await {
                Ok(token) => {
                    ctx.set_header("Authorization", format!("Bearer {token}"));
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        correlation_id = ctx.correlation_id.as_deref().unwrap_or(""),
                        "token supplier failed; continuing without Authorization header"
                    );
                }
            }
            Ok(ctx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticTokenSupplier, TokenError};
    use std::sync::Mutex;

    struct FailingSupplier;

    impl TokenSupplier for FailingSupplier {
        fn token(&self) -> BoxFuture<'_, Result<String, TokenError>> {
            Box::pin(async { Err(TokenError::new("vault unreachable")) })
        }
    }

    struct NamedRecorder {
        tag: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl RequestInterceptor for NamedRecorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn apply<'a>(
            &'a self,
            ctx: RequestContext,
        ) -> BoxFuture<'a, Result<RequestContext, SetupError>> {
            Box::pin(async move {
                self.order.lock().unwrap().push(self.tag);
                Ok(ctx)
            })
        }
    }

    struct FailingInterceptor;

    impl RequestInterceptor for FailingInterceptor {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn apply<'a>(
            &'a self,
            _ctx: RequestContext,
        ) -> BoxFuture<'a, Result<RequestContext, SetupError>> {
            Box::pin(async { Err(SetupError::new("boom")) })
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("GET", "https://api.example.com/v1/things")
    }

    #[tokio::test]
    async fn test_correlation_injector_sets_both_headers() {
        let chain = {
            let mut chain = RequestInterceptorChain::new();
            chain.push(Arc::new(CorrelationInjector));
            chain
        };
        let out = chain.apply(ctx()).await.unwrap();

        let id = out.correlation_id.clone().unwrap();
        assert!(!id.is_empty());
        assert_eq!(out.header("X-Request-ID"), Some(id.as_str()));
        assert_eq!(out.header("X-Correlation-ID"), Some(id.as_str()));
        assert!(out.start_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_correlation_injector_keeps_existing_id() {
        let mut input = ctx();
        input.correlation_id = Some("preassigned".to_string());
        let out = CorrelationInjector.apply(input).await.unwrap();
        assert_eq!(out.correlation_id.as_deref(), Some("preassigned"));
        assert_eq!(out.header("X-Request-ID"), Some("preassigned"));
    }

    #[tokio::test]
    async fn test_auth_injector_sets_bearer_header() {
        let injector = AuthInjector::new(Arc::new(StaticTokenSupplier::new("tok-1")));
        let out = injector.apply(ctx()).await.unwrap();
        assert_eq!(out.header("Authorization"), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn test_auth_injector_degrades_gracefully() {
        let injector = AuthInjector::new(Arc::new(FailingSupplier));
        let out = injector.apply(ctx()).await.unwrap();
        assert_eq!(out.header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_chain_runs_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut chain = RequestInterceptorChain::new();
        chain.push(Arc::new(NamedRecorder {
            tag: "first",
            order: order.clone(),
        }));
        chain.push(Arc::new(NamedRecorder {
            tag: "second",
            order: order.clone(),
        }));

        chain.apply(ctx()).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_chain_aborts_on_failure() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut chain = RequestInterceptorChain::new();
        chain.push(Arc::new(FailingInterceptor));
        chain.push(Arc::new(NamedRecorder {
            tag: "never",
            order: order.clone(),
        }));

        let error = chain.apply(ctx()).await.unwrap_err();
        assert!(matches!(error, ClientError::RequestSetup { .. }));
        assert!(error.message().contains("boom"));
        assert!(order.lock().unwrap().is_empty());
    }
}
