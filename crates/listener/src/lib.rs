//! OS2mo event source infrastructure.
//!
//! OS2mo publishes a message to its topic exchange whenever an object changes.
//! The routing key is the object kind (`engagement`, `person`, ...) and the
//! body is the object's UUID. This crate consumes those messages and routes
//! them to [`EventHandler`]s:
//!
//! - [`MoRouter`] maps routing keys to handlers and merges registries.
//! - [`AmqpSystem`] owns the broker connection: one durable queue per handler,
//!   bound to that handler's routing keys.
//! - [`process_delivery`] runs a handler and decides the [`Settlement`]
//!   (ack, requeue, reject) from the error's [`configurator::RetryPolicy`].
//! - [`RateLimit`] pauses after retryable failures so a poison message cannot
//!   spin the service.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details, topology declaration and message
//! deserialization all live here. Handlers see only [`MoEvent`].

pub mod amqp;
pub mod delivery;
pub mod error;
pub mod payload;
pub mod rate_limit;
pub mod router;

pub use amqp::{redact_url, AmqpConfig, AmqpSystem, Readiness};
pub use delivery::{process_delivery, Settlement};
pub use error::{AmqpError, HandlerError};
pub use payload::{MoEvent, PayloadUuid};
pub use rate_limit::RateLimit;
pub use router::{EventHandler, MoRouter};
