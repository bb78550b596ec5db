//! Normalized error taxonomy for the client pipeline
//!
//! Every failure surfaced to a caller is one of three kinds:
//! - `RequestSetup`: an interceptor failed before any network attempt
//! - `Network`: connectivity failure, timeout/cancellation, or an unclassified
//!   transport failure
//! - `Api`: the server responded with a structured error payload
//!
//! Callers always receive a stable string message and a code, enabling uniform
//! failure presentation regardless of the underlying cause. Serializing an
//! error emits only its public contract (kind, message, status, code,
//! correlation id); diagnostic metadata stays in the out-of-band side table.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::metadata::{self, MetaHandle, RequestMetadata};

/// Convenience type alias for Results using the client error type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Sub-kind of a network failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// Unreachable host, DNS failure, or connection refused
    ConnectionFailed,
    /// Explicit cancellation or a per-attempt timeout
    CancelledOrTimedOut,
    /// Transport failure that fits neither category
    Other,
}

impl NetworkKind {
    /// Stable code string for this kind
    pub fn code(&self) -> &'static str {
        match self {
            NetworkKind::ConnectionFailed => "CONNECTION_FAILED",
            NetworkKind::CancelledOrTimedOut => "CANCELLED_OR_TIMED_OUT",
            NetworkKind::Other => "NETWORK_ERROR",
        }
    }
}

/// Classification of normalized errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Interceptor failure before transport - never retried
    RequestSetup,
    /// Connectivity failure - retryable
    Connectivity,
    /// Timeout or cancellation - retryable
    Timeout,
    /// HTTP 503 - retryable
    ServiceUnavailable,
    /// HTTP 504 - retryable
    GatewayTimeout,
    /// Any other 4xx - deterministic, never retried
    ClientError,
    /// Any other 5xx - deterministic, never retried
    ServerError,
    /// Unclassified - never retried
    Unknown,
}

impl ErrorClassification {
    /// Check if this error type is safe to retry (still subject to the
    /// call site's idempotency flag)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClassification::Connectivity
                | ErrorClassification::Timeout
                | ErrorClassification::ServiceUnavailable
                | ErrorClassification::GatewayTimeout
        )
    }
}

/// Normalized client error
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// A request interceptor failed before any network attempt was made
    #[error("request setup failed: {message}")]
    RequestSetup {
        message: String,
        correlation_id: Option<String>,
    },

    /// Connectivity failure, timeout, or unclassified transport failure
    #[error("{message}")]
    Network {
        kind: NetworkKind,
        message: String,
        correlation_id: Option<String>,
        meta: Option<Arc<MetaHandle>>,
    },

    /// The server responded with a structured error and status code
    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        code: Option<String>,
        details: Option<Value>,
        correlation_id: Option<String>,
        meta: Option<Arc<MetaHandle>>,
    },
}

impl ClientError {
    /// Public kind name, mirrored in serialized output
    pub fn kind_name(&self) -> &'static str {
        match self {
            ClientError::RequestSetup { .. } => "RequestSetupError",
            ClientError::Network { .. } => "NetworkError",
            ClientError::Api { .. } => "ApiError",
        }
    }

    /// Human-readable message, always present
    pub fn message(&self) -> &str {
        match self {
            ClientError::RequestSetup { message, .. }
            | ClientError::Network { message, .. }
            | ClientError::Api { message, .. } => message,
        }
    }

    /// HTTP status code, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stable code string, always present
    pub fn code(&self) -> &str {
        match self {
            ClientError::RequestSetup { .. } => "REQUEST_SETUP_FAILED",
            ClientError::Network { kind, .. } => kind.code(),
            ClientError::Api { code, .. } => code.as_deref().unwrap_or("API_ERROR"),
        }
    }

    /// Structured error details from the server payload, if any
    pub fn details(&self) -> Option<&Value> {
        match self {
            ClientError::Api { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Correlation id of the request that produced this error, when known
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            ClientError::RequestSetup { correlation_id, .. }
            | ClientError::Network { correlation_id, .. }
            | ClientError::Api { correlation_id, .. } => correlation_id.as_deref(),
        }
    }

    /// Alias for [`correlation_id`](Self::correlation_id), matching the server
    /// payload's `traceId` field name
    pub fn trace_id(&self) -> Option<&str> {
        self.correlation_id()
    }

    /// Classify this error for retry logic
    pub fn classification(&self) -> ErrorClassification {
        match self {
            ClientError::RequestSetup { .. } => ErrorClassification::RequestSetup,
            ClientError::Network { kind, .. } => match kind {
                NetworkKind::ConnectionFailed => ErrorClassification::Connectivity,
                NetworkKind::CancelledOrTimedOut => ErrorClassification::Timeout,
                NetworkKind::Other => ErrorClassification::Unknown,
            },
            ClientError::Api { status, .. } => match status {
                503 => ErrorClassification::ServiceUnavailable,
                504 => ErrorClassification::GatewayTimeout,
                400..=499 => ErrorClassification::ClientError,
                500..=599 => ErrorClassification::ServerError,
                _ => ErrorClassification::Unknown,
            },
        }
    }

    /// Retrieve the out-of-band diagnostic metadata attached to this error
    pub fn diagnostics(&self) -> Option<RequestMetadata> {
        match self {
            ClientError::Network { meta, .. } | ClientError::Api { meta, .. } => {
                meta.as_ref().and_then(|handle| metadata::lookup(handle))
            }
            ClientError::RequestSetup { .. } => None,
        }
    }
}

/// Equality over the public contract; diagnostic handles are ignored
impl PartialEq for ClientError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ClientError::RequestSetup {
                    message: m1,
                    correlation_id: c1,
                },
                ClientError::RequestSetup {
                    message: m2,
                    correlation_id: c2,
                },
            ) => m1 == m2 && c1 == c2,
            (
                ClientError::Network {
                    kind: k1,
                    message: m1,
                    correlation_id: c1,
                    ..
                },
                ClientError::Network {
                    kind: k2,
                    message: m2,
                    correlation_id: c2,
                    ..
                },
            ) => k1 == k2 && m1 == m2 && c1 == c2,
            (
                ClientError::Api {
                    message: m1,
                    status: s1,
                    code: co1,
                    details: d1,
                    correlation_id: c1,
                    ..
                },
                ClientError::Api {
                    message: m2,
                    status: s2,
                    code: co2,
                    details: d2,
                    correlation_id: c2,
                    ..
                },
            ) => m1 == m2 && s1 == s2 && co1 == co2 && d1 == d2 && c1 == c2,
            _ => false,
        }
    }
}

/// Serializes only the public contract. Diagnostic metadata (method, url,
/// start time, raw cause) is unreachable from here by construction.
impl Serialize for ClientError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ClientError", 5)?;
        state.serialize_field("kind", self.kind_name())?;
        state.serialize_field("message", self.message())?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("correlation_id", &self.correlation_id())?;
        state.end()
    }
}
