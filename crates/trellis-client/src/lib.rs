//! Trellis Client - correlation-aware HTTP API client
//!
//! This crate provides a robust API client built around an interceptor pipeline:
//! - Correlation-id injection and server-echo extraction
//! - Request interceptors (correlation, auth) executed strictly in order
//! - Response stages (timing, error normalization, auth challenge)
//! - A stable three-kind error taxonomy with a leak-free serialization contract
//! - Retry logic with exponential backoff and an explicit idempotency guard
//!
//! # Example
//!
//! ```no_run
//! use trellis_client::{ApiClient, Result};
//!
//! async fn example() -> Result<()> {
//!     let client = ApiClient::builder("https://api.example.com").build()?;
//!     let prefs: serde_json::Value = client.get("/users/me/preferences").await?;
//!     let _ = prefs;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod builder;
pub mod client;
pub mod context;
pub mod correlation;
pub mod error;
pub mod interceptor;
pub mod metadata;
pub mod navigation;
pub mod normalize;
pub mod retry;
pub mod transport;


pub use auth::{DedupTokenSupplier, StaticTokenSupplier, TokenError, TokenSupplier};
pub use builder::ClientBuilder;
pub use client::{ApiClient, ClientConfig, RequestOptions};
pub use context::{RequestBody, RequestContext};
pub use error::{ClientError, ErrorClassification, NetworkKind, Result};
pub use interceptor::request::{
    AuthInjector, CorrelationInjector, RequestInterceptor, RequestInterceptorChain, SetupError,
};
pub use interceptor::response::{
    AttemptFailure, AuthChallengeStage, ErrorNormalizationStage, ResponseInterceptorChain,
    ResponseStage, TimingStage, UnauthorizedHook,
};
pub use metadata::RequestMetadata;
pub use navigation::{LoggingNavigator, Navigator, UNAUTHORIZED_ROUTE};
pub use retry::{RetryDecision, RetryHandler, RetryPolicy};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportErrorKind, TransportResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
    }
}
