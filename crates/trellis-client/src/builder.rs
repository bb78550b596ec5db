//! Client construction
//!
//! The builder assembles the default pipeline - correlation injection, optional
//! auth injection, timing, error normalization, and the auth challenge stage -
//! and lets callers append their own interceptors and stages after the
//! defaults.

use std::sync::Arc;

use crate::auth::TokenSupplier;
use crate::client::{ApiClient, ClientConfig};
use crate::error::{ClientError, Result};
use crate::interceptor::request::{
    AuthInjector, CorrelationInjector, RequestInterceptor, RequestInterceptorChain,
};
use crate::interceptor::response::{
    AuthChallengeStage, ErrorNormalizationStage, ResponseInterceptorChain, ResponseStage,
    TimingStage, UnauthorizedHook,
};
use crate::navigation::{LoggingNavigator, Navigator};
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport};

/// Builder for [`ApiClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    token_supplier: Option<Arc<dyn TokenSupplier>>,
    navigator: Arc<dyn Navigator>,
    on_unauthorized: Option<UnauthorizedHook>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(base_url),
            transport: None,
            token_supplier: None,
            navigator: Arc::new(LoggingNavigator),
            on_unauthorized: None,
            request_interceptors: Vec::new(),
            response_stages: Vec::new(),
        }
    }

    /// Per-attempt timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Disable retries entirely; every failure surfaces on the first attempt.
    pub fn disable_retry(mut self) -> Self {
        self.config.enable_retry = false;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Replace the default reqwest transport. Tests use this to inject mocks.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Enable the auth injector backed by this supplier.
    pub fn token_supplier(mut self, supplier: Arc<dyn TokenSupplier>) -> Self {
        self.token_supplier = Some(supplier);
        self
    }

    /// Navigation capability used for the default unauthorized behavior.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Callback invoked on 401 responses instead of navigating.
    pub fn on_unauthorized(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    /// Append a request interceptor after the built-in ones.
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Append a response stage after the built-in ones.
    pub fn response_stage(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new().map_err(|e| ClientError::RequestSetup {
                message: format!("failed to initialize transport: {e}"),
                correlation_id: None,
            })?),
        };

        let mut request_chain = RequestInterceptorChain::new();
        request_chain.push(Arc::new(CorrelationInjector));
        if let Some(supplier) = self.token_supplier {
            request_chain.push(Arc::new(AuthInjector::new(supplier)));
        }
        for interceptor in self.request_interceptors {
            request_chain.push(interceptor);
        }

        let mut response_chain = ResponseInterceptorChain::new();
        response_chain.push(Arc::new(TimingStage));
        response_chain.push(Arc::new(ErrorNormalizationStage));
        response_chain.push(Arc::new(AuthChallengeStage::new(
            self.navigator,
            self.on_unauthorized,
        )));
        for stage in self.response_stages {
            response_chain.push(stage);
        }

        Ok(ApiClient::from_parts(
            self.config,
            transport,
            Arc::new(request_chain),
            Arc::new(response_chain),
        ))
    }
}
