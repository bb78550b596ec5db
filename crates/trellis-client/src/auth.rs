//! Token supply for the auth injector
//!
//! The injector is parameterized by an asynchronous [`TokenSupplier`]. A
//! supplier must tolerate concurrent invocation; [`DedupTokenSupplier`]
//! wraps any supplier so that N simultaneous requests trigger at most one
//! in-flight fetch.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;

/// Failure to obtain an auth token
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TokenError(pub String);

impl TokenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Asynchronous source of bearer tokens.
pub trait TokenSupplier: Send + Sync {
    fn token(&self) -> BoxFuture<'_, Result<String, TokenError>>;
}

/// Supplier backed by a fixed token, for services with long-lived credentials
/// and for tests.
#[derive(Debug, Clone)]
pub struct StaticTokenSupplier {
    token: String,
}

impl StaticTokenSupplier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenSupplier for StaticTokenSupplier {
    fn token(&self) -> BoxFuture<'_, Result<String, TokenError>> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<String, TokenError>>>;

/// De-duplicates concurrent token fetches.
///
/// The first caller starts a fetch on the inner supplier; callers arriving
/// while it is in flight await the same future. The slot is cleared once the
/// fetch resolves, so later requests observe fresh credentials.
pub struct DedupTokenSupplier {
    inner: Arc<dyn TokenSupplier>,
    inflight: Mutex<Option<SharedFetch>>,
}

impl DedupTokenSupplier {
    pub fn new(inner: Arc<dyn TokenSupplier>) -> Self {
        Self {
            inner,
            inflight: Mutex::new(None),
        }
    }
}

impl TokenSupplier for DedupTokenSupplier {
    fn token(&self) -> BoxFuture<'_, Result<String, TokenError>> {
        let fetch = {
            let mut slot = self
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut: BoxFuture<'static, Result<String, TokenError>> =
                        Box::pin(async move { inner.token().await });
                    let shared = fut.shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        Box::pin(async move {
            let result = fetch.clone().await;
            let mut slot = self
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&fetch)) {
                *slot = None;
            }
            result
        })
    }
}
