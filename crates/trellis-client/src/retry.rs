//! Retry policy and per-request retry state
//!
//! Eligibility is deterministic: an attempt is retried only when the
//! normalized error classifies as retryable (connectivity loss, timeout,
//! 503, 504) AND the caller marked the request idempotent. Delays come from
//! an exponential backoff schedule with optional jitter.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use crate::error::ClientError;

/// Backoff and attempt-count configuration.
///
/// `max_attempts` counts every attempt including the first, so the default of
/// 3 permits at most two retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the backoff schedule for a single request's lifetime.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: Duration::from_millis(self.base_delay_ms),
            initial_interval: Duration::from_millis(self.base_delay_ms),
            max_interval: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            randomization_factor: if self.jitter { 0.5 } else { 0.0 },
            // Attempt count is the only cutoff; never stop on elapsed time.
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Outcome of a retry-eligibility check
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    NoRetry,
}

/// Per-request retry state: attempt counter plus backoff schedule.
///
/// One handler lives for the duration of a single logical request and is
/// consulted once per failed attempt.
pub struct RetryHandler {
    policy: RetryPolicy,
    attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            attempts: 0,
            backoff,
        }
    }

    /// Attempts consumed so far (failed attempts recorded via `should_retry`).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed attempt and decide whether to retry it.
    ///
    /// The counter increments before the budget check, so a policy with
    /// `max_attempts = 2` retries exactly once.
    pub fn should_retry(&mut self, error: &ClientError, is_idempotent: bool) -> RetryDecision {
        self.attempts += 1;

        if self.attempts >= self.policy.max_attempts {
            tracing::debug!(
                attempts = self.attempts,
                max_attempts = self.policy.max_attempts,
                "retry budget exhausted"
            );
            return RetryDecision::NoRetry;
        }
        if !is_idempotent {
            return RetryDecision::NoRetry;
        }
        if !error.classification().is_retryable() {
            return RetryDecision::NoRetry;
        }

        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(Duration::from_millis(self.policy.max_delay_ms));
        tracing::debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling retry"
        );
        RetryDecision::Retry { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkKind;

    fn timeout_error() -> ClientError {
        ClientError::Network {
            kind: NetworkKind::CancelledOrTimedOut,
            message: "request was cancelled or timed out".to_string(),
            correlation_id: None,
            meta: None,
        }
    }

    fn api_error(status: u16) -> ClientError {
        ClientError::Api {
            message: format!("request failed with status {status}"),
            status,
            code: None,
            details: None,
            correlation_id: None,
            meta: None,
        }
    }

    #[test]
    fn test_retryable_idempotent_failure_retries() {
        let mut handler = RetryHandler::new(RetryPolicy::default());
        let decision = handler.should_retry(&timeout_error(), true);
        assert!(matches!(decision, RetryDecision::Retry { .. }));
    }

    #[test]
    fn test_non_idempotent_never_retries() {
        let mut handler = RetryHandler::new(RetryPolicy::default());
        assert_eq!(handler.should_retry(&timeout_error(), false), RetryDecision::NoRetry);
    }

    #[test]
    fn test_non_retryable_status_never_retries() {
        let mut handler = RetryHandler::new(RetryPolicy::default());
        for status in [400, 401, 404, 422, 429, 500] {
            assert_eq!(
                handler.should_retry(&api_error(status), true),
                RetryDecision::NoRetry,
                "status {status} must not retry"
            );
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [503, 504] {
            let mut handler = RetryHandler::new(RetryPolicy::default());
            assert!(
                matches!(handler.should_retry(&api_error(status), true), RetryDecision::Retry { .. }),
                "status {status} must retry"
            );
        }
    }

    #[test]
    fn test_max_attempts_two_allows_exactly_one_retry() {
        let mut handler = RetryHandler::new(RetryPolicy::default().with_max_attempts(2));
        assert!(matches!(
            handler.should_retry(&timeout_error(), true),
            RetryDecision::Retry { .. }
        ));
        assert_eq!(handler.should_retry(&timeout_error(), true), RetryDecision::NoRetry);
    }

    #[test]
    fn test_setup_errors_never_retry() {
        let mut handler = RetryHandler::new(RetryPolicy::default());
        let error = ClientError::RequestSetup {
            message: "interceptor failed".to_string(),
            correlation_id: None,
        };
        assert_eq!(handler.should_retry(&error, true), RetryDecision::NoRetry);
    }

    #[test]
    fn test_delays_grow_without_jitter() {
        let policy = RetryPolicy::default()
            .with_max_attempts(10)
            .with_base_delay_ms(100)
            .with_multiplier(2.0)
            .with_jitter(false);
        let mut handler = RetryHandler::new(policy);

        let mut delays = Vec::new();
        for _ in 0..3 {
            match handler.should_retry(&timeout_error(), true) {
                RetryDecision::Retry { delay } => delays.push(delay),
                RetryDecision::NoRetry => panic!("expected retry"),
            }
        }
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::default()
            .with_max_attempts(20)
            .with_base_delay_ms(1_000)
            .with_max_delay_ms(2_000)
            .with_multiplier(10.0)
            .with_jitter(false);
        let mut handler = RetryHandler::new(policy);

        let mut last = Duration::ZERO;
        for _ in 0..5 {
            if let RetryDecision::Retry { delay } = handler.should_retry(&timeout_error(), true) {
                last = delay;
            }
        }
        assert!(last <= Duration::from_millis(2_000));
    }
}
