//! Failure rate limiting.
//!
//! A message whose handler keeps failing is requeued and redelivered at once.
//! Without a pause the service would spin on it; so after a retryable failure
//! the consumer waits before it settles the delivery.

use std::time::Duration;

use configurator::RetryPolicy;
use tracing::debug;

/// Delay applied after a retryable handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    delay: Duration,
}

impl RateLimit {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// How long to wait for a failure with this policy. A `Retry-After` hint
    /// longer than the configured delay wins.
    pub fn backoff(&self, policy: &RetryPolicy) -> Option<Duration> {
        match policy {
            RetryPolicy::Retryable { after } => {
                Some(after.map_or(self.delay, |after| after.max(self.delay)))
            }
            RetryPolicy::NonRetryable => None,
        }
    }

    /// Sleeps for [`Self::backoff`], if any.
    pub async fn wait(&self, policy: &RetryPolicy) {
        if let Some(backoff) = self.backoff(policy) {
            debug!(?backoff, "Rate limiting after failure");
            tokio::time::sleep(backoff).await;
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_failures_are_not_delayed() {
        assert_eq!(RateLimit::default().backoff(&RetryPolicy::NonRetryable), None);
    }

    #[test]
    fn retry_after_hint_only_extends_the_delay() {
        let limit = RateLimit::new(Duration::from_secs(10));
        assert_eq!(
            limit.backoff(&RetryPolicy::retryable()),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            limit.backoff(&RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2))
            }),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            limit.backoff(&RetryPolicy::Retryable {
                after: Some(Duration::from_secs(60))
            }),
            Some(Duration::from_secs(60))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_the_backoff() {
        let limit = RateLimit::new(Duration::from_secs(30));
        let start = tokio::time::Instant::now();
        limit.wait(&RetryPolicy::retryable()).await;
        assert!(start.elapsed() >= Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        limit.wait(&RetryPolicy::NonRetryable).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
