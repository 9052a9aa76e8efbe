//! Backoff policy for gateway calls.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::error::GatewayError;

/// Timeout and retry settings shared by the HTTP gateway clients.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Deadline for a single HTTP call.
    pub timeout: Duration,

    /// Retries after the first attempt.
    pub max_retries: usize,

    /// Delay before the first retry.
    pub min_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_retries: 2,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given per-call timeout and retry count.
    pub fn new(timeout: Duration, max_retries: usize) -> Self {
        Self {
            timeout,
            max_retries,
            ..Default::default()
        }
    }

    /// Disables retries; each call gets exactly one attempt.
    pub fn no_retries(mut self) -> Self {
        self.max_retries = 0;
        self
    }

    /// Builds the backoff schedule.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Retry filter for read-only lookups: any transport failure.
pub fn is_retryable_lookup(err: &GatewayError) -> bool {
    err.is_retryable()
}

/// Retry filter for payment submission.
///
/// A submission that reached the payment service may already have been
/// charged, whatever status came back, so only requests that were never
/// delivered are retried.
pub fn is_retryable_submission(err: &GatewayError) -> bool {
    err.is_undelivered()
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::BackoffBuilder;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.max_retries, 2);
    }

    #[test]
    fn test_backoff_is_bounded_by_max_retries() {
        let delays: Vec<_> = RetryPolicy::default().backoff().build().collect();
        assert_eq!(delays.len(), 2);
        assert!(RetryPolicy::default().no_retries().backoff().build().next().is_none());
    }

    #[test]
    fn test_submission_retries_only_undelivered_requests() {
        let timeout = GatewayError::Timeout("5s".into());
        assert!(is_retryable_lookup(&timeout));
        assert!(!is_retryable_submission(&timeout));

        let gateway_timeout = GatewayError::ServerError {
            status: 504,
            message: "upstream timed out".into(),
        };
        assert!(is_retryable_lookup(&gateway_timeout));
        assert!(!is_retryable_submission(&gateway_timeout));
        assert!(!is_retryable_submission(&GatewayError::Interrupted("reset".into())));
        assert!(is_retryable_submission(&GatewayError::Unavailable(
            "connection refused".into()
        )));
    }
}
