use configurator::RetryPolicy;
use thiserror::Error;

/// A delivery could not be handled.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message body is not a UUID.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Nothing is registered for the routing key (or handler name).
    #[error("No handler registered for '{0}'")]
    NoHandler(String),

    /// A registered handler returned an error.
    #[error("Handler '{handler}' failed: {source}")]
    Failed {
        handler: String,
        retry: RetryPolicy,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl HandlerError {
    /// Wraps a handler failure together with its retry decision.
    pub fn failed(
        handler: impl Into<String>,
        retry: RetryPolicy,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Failed {
            handler: handler.into(),
            retry,
            source: source.into(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::InvalidPayload(_) | Self::NoHandler(_) => RetryPolicy::NonRetryable,
            Self::Failed { retry, .. } => retry.clone(),
        }
    }
}

/// Broker-level failures.
#[derive(Debug, Error)]
pub enum AmqpError {
    #[error("AMQP error: {0}")]
    Lapin(#[from] lapin::Error),

    #[error("Consumer for queue '{queue}' stopped")]
    ConsumerStopped { queue: String },

    #[error("No handlers registered; refusing to start without queues")]
    NoHandlers,
}
