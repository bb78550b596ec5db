//! Response interceptor chain
//!
//! The transport outcome - success or failure - is folded through an ordered
//! list of stages, each exposing `on_success` and `on_failure` hooks. A hook
//! may transform the value, observe it, or pass it through; failure hooks
//! always return a failure, so nothing is ever silently swallowed.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::ClientError;
use crate::navigation::{Navigator, UNAUTHORIZED_ROUTE};
use crate::normalize;
use crate::transport::{TransportError, TransportResponse};

/// Failure state flowing through the response chain.
///
/// Raw transport failures and non-2xx responses enter unnormalized and leave
/// the normalization stage as `Normalized`; a failure that is already
/// normalized passes through every stage untouched.
#[derive(Debug)]
pub enum AttemptFailure {
    /// Transport-level failure, not yet normalized
    Transport(TransportError),
    /// Non-2xx response, not yet normalized
    HttpStatus(TransportResponse),
    /// Fully normalized client error
    Normalized(ClientError),
}

impl AttemptFailure {
    /// Collapse into a normalized error, normalizing on the spot if the chain
    /// was configured without a normalization stage.
    pub fn into_error(self, ctx: &RequestContext) -> ClientError {
        match self {
            AttemptFailure::Normalized(error) => error,
            AttemptFailure::Transport(transport) => normalize::from_transport(&transport, ctx),
            AttemptFailure::HttpStatus(response) => normalize::from_response(&response, ctx),
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            AttemptFailure::Transport(_) => None,
            AttemptFailure::HttpStatus(response) => Some(response.status),
            AttemptFailure::Normalized(error) => error.status(),
        }
    }
}

/// One stage of the response pipeline.
///
/// Default hooks pass the outcome through unchanged, so a stage only
/// implements the path it cares about.
pub trait ResponseStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_success(
        &self,
        _ctx: &RequestContext,
        response: TransportResponse,
    ) -> Result<TransportResponse, AttemptFailure> {
        Ok(response)
    }

    fn on_failure(&self, _ctx: &RequestContext, failure: AttemptFailure) -> AttemptFailure {
        failure
    }
}

/// Ordered response pipeline, executed as a plain fold over the stages.
pub struct ResponseInterceptorChain {
    stages: Vec<Arc<dyn ResponseStage>>,
}

impl ResponseInterceptorChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; execution follows registration order.
    pub fn push(&mut self, stage: Arc<dyn ResponseStage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Fold the outcome through every stage in order, then collapse any
    /// remaining failure into a normalized error.
    pub fn process(
        &self,
        ctx: &RequestContext,
        outcome: Result<TransportResponse, AttemptFailure>,
    ) -> Result<TransportResponse, ClientError> {
        let mut outcome = outcome;
        for stage in &self.stages {
            outcome = match outcome {
                Ok(response) => stage.on_success(ctx, response),
                Err(failure) => Err(stage.on_failure(ctx, failure)),
            };
        }
        outcome.map_err(|failure| failure.into_error(ctx))
    }
}

impl Default for ResponseInterceptorChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits one structured log event per completed attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingStage;

impl ResponseStage for TimingStage {
    fn name(&self) -> &'static str {
        "timing"
    }

    fn on_success(
        &self,
        ctx: &RequestContext,
        response: TransportResponse,
    ) -> Result<TransportResponse, AttemptFailure> {
        tracing::info!(
            method = %ctx.method,
            url = %ctx.url,
            status = response.status,
            elapsed_ms = ctx.elapsed_ms().unwrap_or(0),
            correlation_id = ctx.correlation_id.as_deref().unwrap_or(""),
            "request completed"
        );
        Ok(response)
    }

    fn on_failure(&self, ctx: &RequestContext, failure: AttemptFailure) -> AttemptFailure {
        // Guarded: a request that failed before the correlation injector ran
        // has no start time and produces no timing event.
        if let Some(elapsed_ms) = ctx.elapsed_ms() {
            tracing::warn!(
                method = %ctx.method,
                url = %ctx.url,
                status = failure.status().unwrap_or(0),
                elapsed_ms,
                correlation_id = ctx.correlation_id.as_deref().unwrap_or(""),
                "request failed"
            );
        }
        failure
    }
}

/// Normalizes raw failures into the client error taxonomy.
///
/// Already-normalized errors pass through untouched, so running the stage
/// twice yields an equal error rather than a nested wrapper.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorNormalizationStage;

impl ResponseStage for ErrorNormalizationStage {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn on_failure(&self, ctx: &RequestContext, failure: AttemptFailure) -> AttemptFailure {
        match failure {
            AttemptFailure::Normalized(error) => AttemptFailure::Normalized(error),
            AttemptFailure::Transport(transport) => {
                AttemptFailure::Normalized(normalize::from_transport(&transport, ctx))
            }
            AttemptFailure::HttpStatus(response) => {
                AttemptFailure::Normalized(normalize::from_response(&response, ctx))
            }
        }
    }
}

/// Hook invoked when an unauthorized response is observed
pub type UnauthorizedHook = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Reacts to 401 responses.
///
/// Invokes the configured hook if one is supplied, otherwise navigates to the
/// unauthorized route with a reason parameter. The side effect never cancels
/// propagation: the error continues down the chain either way.
pub struct AuthChallengeStage {
    navigator: Arc<dyn Navigator>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl AuthChallengeStage {
    pub fn new(navigator: Arc<dyn Navigator>, on_unauthorized: Option<UnauthorizedHook>) -> Self {
        Self {
            navigator,
            on_unauthorized,
        }
    }
}

impl ResponseStage for AuthChallengeStage {
    fn name(&self) -> &'static str {
        "auth-challenge"
    }

    fn on_failure(&self, ctx: &RequestContext, failure: AttemptFailure) -> AttemptFailure {
        if let AttemptFailure::Normalized(error) = &failure {
            if error.status() == Some(401) {
                tracing::warn!(
                    correlation_id = ctx.correlation_id.as_deref().unwrap_or(""),
                    "unauthorized response observed"
                );
                match &self.on_unauthorized {
                    Some(hook) => hook(error),
                    None => self
                        .navigator
                        .navigate(&format!("{UNAUTHORIZED_ROUTE}?reason=session_expired")),
                }
            }
        }
        failure
    }
}
