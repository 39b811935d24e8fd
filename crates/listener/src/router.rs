//! Routing-key based event router.
//!
//! Handlers register for one or more service types. Each handler later gets
//! its own queue, bound to every routing key it registered for, so a slow or
//! failing handler never holds up another one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{HandlerError, MoEvent, PayloadUuid};

/// Something that reacts to OS2mo change events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name; part of the handler's queue name.
    fn name(&self) -> &str;

    async fn handle(&self, event: &MoEvent) -> Result<(), HandlerError>;
}

#[derive(Clone)]
struct Registration {
    handler: Arc<dyn EventHandler>,
    routing_keys: BTreeSet<String>,
}

/// Registry of handlers and the routing keys they listen on.
#[derive(Clone, Default)]
pub struct MoRouter {
    registry: BTreeMap<String, Registration>,
}

impl MoRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `service_type`.
    ///
    /// Registering the same handler name again adds the routing key to its
    /// existing binding set; the most recently supplied handler instance wins.
    pub fn register(&mut self, service_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let service_type = service_type.into();
        let name = handler.name().to_string();
        debug!(handler = %name, %service_type, "Registering handler");
        let entry = self
            .registry
            .entry(name)
            .or_insert_with(|| Registration {
                handler: handler.clone(),
                routing_keys: BTreeSet::new(),
            });
        entry.handler = handler;
        entry.routing_keys.insert(service_type);
    }

    /// Merges every registration from `other` into this router.
    pub fn update(&mut self, other: &MoRouter) {
        for registration in other.registry.values() {
            for key in &registration.routing_keys {
                self.register(key.clone(), registration.handler.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Handler names, in sorted order.
    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    /// Routing keys a handler is bound to.
    pub fn routing_keys(&self, handler_name: &str) -> Vec<String> {
        self.registry
            .get(handler_name)
            .map(|r| r.routing_keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Looks up a handler by name.
    pub fn handler(&self, handler_name: &str) -> Option<Arc<dyn EventHandler>> {
        self.registry.get(handler_name).map(|r| r.handler.clone())
    }

    /// Delivers one message to every handler bound to `routing_key`.
    ///
    /// Handlers run in name order; the first failure is returned and the
    /// remaining handlers are not called.
    pub async fn dispatch(&self, routing_key: &str, body: &[u8]) -> Result<(), HandlerError> {
        let event = Self::event(routing_key, body)?;
        let mut handled = false;
        for registration in self.registry.values() {
            if registration.routing_keys.contains(routing_key) {
                handled = true;
                registration.handler.handle(&event).await?;
            }
        }
        if handled {
            Ok(())
        } else {
            Err(HandlerError::NoHandler(routing_key.to_string()))
        }
    }

    /// Delivers one message to a single named handler, as a per-handler queue
    /// consumer does.
    pub async fn dispatch_to(
        &self,
        handler_name: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), HandlerError> {
        let registration = self
            .registry
            .get(handler_name)
            .filter(|r| r.routing_keys.contains(routing_key))
            .ok_or_else(|| HandlerError::NoHandler(format!("{handler_name}/{routing_key}")))?;
        let event = Self::event(routing_key, body)?;
        registration.handler.handle(&event).await
    }

    fn event(routing_key: &str, body: &[u8]) -> Result<MoEvent, HandlerError> {
        Ok(MoEvent {
            service_type: routing_key.to_string(),
            uuid: PayloadUuid::parse(body)?,
        })
    }
}

impl fmt::Debug for MoRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.registry
                    .iter()
                    .map(|(name, r)| (name, &r.routing_keys)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use configurator::RetryPolicy;
    use uuid::Uuid;

    use super::*;

    struct Recorder {
        name: &'static str,
        seen: Mutex<Vec<MoEvent>>,
        fail: bool,
    }

    impl Recorder {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, event: &MoEvent) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(HandlerError::failed(
                    self.name,
                    RetryPolicy::retryable(),
                    "boom",
                ));
            }
            Ok(())
        }
    }

    fn body(uuid: Uuid) -> Vec<u8> {
        format!("\"{uuid}\"").into_bytes()
    }

    #[tokio::test]
    async fn dispatch_reaches_handlers_for_the_routing_key_only() {
        let engagement = Recorder::new("engagement_listener");
        let address = Recorder::new("address_listener");
        let mut router = MoRouter::new();
        router.register("engagement", engagement.clone());
        router.register("address", address.clone());

        let uuid = Uuid::new_v4();
        router.dispatch("engagement", &body(uuid)).await.unwrap();

        let seen = engagement.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].service_type, "engagement");
        assert_eq!(seen[0].uuid.as_uuid(), uuid);
        assert!(address.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_routing_key_is_rejected() {
        let mut router = MoRouter::new();
        router.register("engagement", Recorder::new("engagement_listener"));
        let err = router
            .dispatch("ituser", &body(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NoHandler(_)));
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[tokio::test]
    async fn invalid_body_never_reaches_handler() {
        let handler = Recorder::new("engagement_listener");
        let mut router = MoRouter::new();
        router.register("engagement", handler.clone());
        let err = router.dispatch("engagement", b"nope").await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_failure_is_returned() {
        let mut router = MoRouter::new();
        router.register("engagement", Recorder::failing("engagement_listener"));
        let err = router
            .dispatch("engagement", &body(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(err.retry_policy().is_retryable());
    }

    #[test]
    fn update_merges_registries() {
        let handler = Recorder::new("engagement_listener");
        let mut app = MoRouter::new();
        app.register("engagement", handler.clone());

        let mut system = MoRouter::new();
        system.register("person", Recorder::new("person_listener"));
        system.update(&app);

        assert_eq!(
            system.handler_names().collect::<Vec<_>>(),
            vec!["engagement_listener", "person_listener"]
        );
        assert_eq!(system.routing_keys("engagement_listener"), vec!["engagement"]);
    }

    #[test]
    fn registering_twice_accumulates_routing_keys() {
        let handler = Recorder::new("multi");
        let mut router = MoRouter::new();
        router.register("engagement", handler.clone());
        router.register("person", handler);
        assert_eq!(router.routing_keys("multi"), vec!["engagement", "person"]);
        assert!(router.routing_keys("missing").is_empty());
    }

    #[tokio::test]
    async fn dispatch_to_targets_one_handler() {
        let first = Recorder::new("first");
        let second = Recorder::new("second");
        let mut router = MoRouter::new();
        router.register("engagement", first.clone());
        router.register("engagement", second.clone());

        router
            .dispatch_to("second", "engagement", &body(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(first.seen.lock().unwrap().is_empty());
        assert_eq!(second.seen.lock().unwrap().len(), 1);

        let err = router
            .dispatch_to("second", "person", &body(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NoHandler(_)));
    }
}
