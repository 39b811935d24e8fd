//! Turning a handler result into a broker acknowledgement.

use std::time::Instant;

use tracing::{error, warn};

use crate::{HandlerError, MoRouter, RateLimit};

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Handled; remove from the queue.
    Ack,
    /// Failed transiently; put back on the queue.
    Requeue,
    /// Failed permanently; drop or dead-letter.
    Reject,
}

impl Settlement {
    pub fn for_result(result: &Result<(), HandlerError>) -> Self {
        match result {
            Ok(()) => Self::Ack,
            Err(err) if err.retry_policy().is_retryable() => Self::Requeue,
            Err(_) => Self::Reject,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Requeue => "requeue",
            Self::Reject => "reject",
        }
    }
}

/// Runs one delivery through its handler and decides how to settle it.
///
/// Retryable failures are rate limited here, before the caller nacks, so the
/// redelivery cannot arrive sooner than the configured delay.
pub async fn process_delivery(
    router: &MoRouter,
    handler_name: &str,
    rate_limit: RateLimit,
    routing_key: &str,
    body: &[u8],
) -> Settlement {
    let started = Instant::now();
    let result = router.dispatch_to(handler_name, routing_key, body).await;
    let settlement = Settlement::for_result(&result);

    metrics::histogram!("amqp_handler_duration_seconds", "handler" => handler_name.to_string())
        .record(started.elapsed().as_secs_f64());
    metrics::counter!(
        "amqp_deliveries_total",
        "handler" => handler_name.to_string(),
        "settlement" => settlement.label()
    )
    .increment(1);

    if let Err(err) = &result {
        let policy = err.retry_policy();
        match settlement {
            Settlement::Requeue => {
                warn!(handler = handler_name, routing_key, error = %err, "Handler failed; will requeue");
                rate_limit.wait(&policy).await;
            }
            _ => error!(handler = handler_name, routing_key, error = %err, "Handler failed permanently; rejecting"),
        }
    }
    settlement
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use configurator::RetryPolicy;
    use uuid::Uuid;

    use super::*;
    use crate::{EventHandler, MoEvent};

    struct Scripted {
        policy: Option<RetryPolicy>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn handle(&self, _event: &MoEvent) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.policy {
                None => Ok(()),
                Some(policy) => Err(HandlerError::failed("scripted", policy.clone(), "failed")),
            }
        }
    }

    fn router(policy: Option<RetryPolicy>) -> (MoRouter, Arc<Scripted>) {
        let handler = Arc::new(Scripted {
            policy,
            calls: AtomicUsize::new(0),
        });
        let mut router = MoRouter::new();
        router.register("engagement", handler.clone());
        (router, handler)
    }

    fn body() -> Vec<u8> {
        format!("\"{}\"", Uuid::new_v4()).into_bytes()
    }

    #[tokio::test]
    async fn success_is_acked() {
        let (router, handler) = router(None);
        let settlement =
            process_delivery(&router, "scripted", RateLimit::default(), "engagement", &body()).await;
        assert_eq!(settlement, Settlement::Ack);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failure_is_requeued_after_the_delay() {
        let (router, _) = router(Some(RetryPolicy::retryable()));
        let start = tokio::time::Instant::now();
        let settlement = process_delivery(
            &router,
            "scripted",
            RateLimit::new(Duration::from_secs(30)),
            "engagement",
            &body(),
        )
        .await;
        assert_eq!(settlement, Settlement::Requeue);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_rejected_without_delay() {
        let (router, _) = router(Some(RetryPolicy::NonRetryable));
        let start = tokio::time::Instant::now();
        let settlement =
            process_delivery(&router, "scripted", RateLimit::default(), "engagement", &body()).await;
        assert_eq!(settlement, Settlement::Reject);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (router, handler) = router(None);
        let settlement =
            process_delivery(&router, "scripted", RateLimit::default(), "engagement", b"{}").await;
        assert_eq!(settlement, Settlement::Reject);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
