//! The engagement listener.
//!
//! Listens on changes to service type `engagement` (object type: job
//! function). Each event carries the engagement UUID; the listener binds it to
//! the log context and hands it to [`process_engagement_events`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info_span, Instrument};

use configurator::{
    process_engagement_events, ConfiguratorError, EngagementUuid, JobFunctionRules, MoGraphQl,
    ProcessOutcome,
};
use listener::{EventHandler, HandlerError, MoEvent, MoRouter};

/// Routing key OS2mo uses for engagement changes.
pub const SERVICE_TYPE: &str = "engagement";

pub struct EngagementListener {
    mo: Arc<dyn MoGraphQl>,
    rules: JobFunctionRules,
}

impl EngagementListener {
    /// Handler name; the queue becomes `<application_name>_listener`.
    pub const NAME: &'static str = "listener";

    pub fn new(mo: Arc<dyn MoGraphQl>, rules: JobFunctionRules) -> Self {
        Self { mo, rules }
    }

    /// Processes one engagement with `engagement_uuid` in the log context.
    pub async fn process(
        &self,
        engagement_uuid: EngagementUuid,
    ) -> Result<ProcessOutcome, ConfiguratorError> {
        let span = info_span!("engagement", %engagement_uuid);
        let outcome = process_engagement_events(self.mo.as_ref(), &self.rules, engagement_uuid)
            .instrument(span)
            .await?;
        metrics::counter!("engagement_events_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }
}

#[async_trait]
impl EventHandler for EngagementListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &MoEvent) -> Result<(), HandlerError> {
        let engagement_uuid = EngagementUuid::new(event.uuid.as_uuid());
        self.process(engagement_uuid)
            .await
            .map(|_| ())
            .map_err(|err| HandlerError::failed(Self::NAME, err.retry_policy(), err))
    }
}

/// The application's AMQP routes: the engagement listener on `engagement`.
pub fn amqp_router(listener: Arc<EngagementListener>) -> MoRouter {
    let mut router = MoRouter::new();
    router.register(SERVICE_TYPE, listener);
    router
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use configurator::{ClassLookup, ClassUuid, Engagement, JobFunction, MoError};
    use listener::PayloadUuid;
    use tracing_test::traced_test;
    use uuid::Uuid;

    use super::*;

    /// Records every engagement lookup and answers with a fixed result.
    pub(crate) struct RecordingMo {
        pub(crate) fail: bool,
        pub(crate) calls: Mutex<Vec<EngagementUuid>>,
    }

    impl RecordingMo {
        pub(crate) fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MoGraphQl for RecordingMo {
        async fn engagement(&self, uuid: EngagementUuid) -> Result<Option<Engagement>, MoError> {
            tracing::info!("looking up engagement in fake OS2mo");
            self.calls.lock().unwrap().push(uuid);
            if self.fail {
                return Err(MoError::Transport {
                    message: "connection refused".into(),
                });
            }
            Ok(None)
        }

        async fn job_function_class(
            &self,
            _lookup: &ClassLookup,
        ) -> Result<Option<JobFunction>, MoError> {
            unreachable!("no engagement is ever returned")
        }

        async fn set_job_function(
            &self,
            _uuid: EngagementUuid,
            _job_function: ClassUuid,
            _from: NaiveDate,
            _to: Option<NaiveDate>,
        ) -> Result<(), MoError> {
            unreachable!("no engagement is ever returned")
        }
    }

    fn event(uuid: Uuid) -> MoEvent {
        MoEvent {
            service_type: SERVICE_TYPE.into(),
            uuid: PayloadUuid::new(uuid),
        }
    }

    #[tokio::test]
    async fn handle_processes_the_event_uuid_exactly_once() {
        let mo = RecordingMo::new(false);
        let listener = EngagementListener::new(mo.clone(), JobFunctionRules::default());
        let uuid = Uuid::new_v4();

        listener.handle(&event(uuid)).await.unwrap();

        assert_eq!(
            mo.calls.lock().unwrap().as_slice(),
            &[EngagementUuid::new(uuid)]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn engagement_uuid_is_bound_to_the_log_context() {
        let mo = RecordingMo::new(false);
        let listener = EngagementListener::new(mo, JobFunctionRules::default());
        let uuid = Uuid::new_v4();

        listener.handle(&event(uuid)).await.unwrap();

        assert!(logs_contain("looking up engagement in fake OS2mo"));
        assert!(logs_contain(&format!("engagement_uuid={uuid}")));
    }

    #[tokio::test]
    async fn processing_errors_are_not_swallowed() {
        let mo = RecordingMo::new(true);
        let listener = EngagementListener::new(mo.clone(), JobFunctionRules::default());

        let err = listener.handle(&event(Uuid::new_v4())).await.unwrap_err();

        assert!(err.retry_policy().is_retryable());
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(mo.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn router_binds_listener_to_engagement_events() {
        let mo = RecordingMo::new(false);
        let listener = Arc::new(EngagementListener::new(mo.clone(), JobFunctionRules::default()));
        let router = amqp_router(listener);

        assert_eq!(router.routing_keys(EngagementListener::NAME), vec!["engagement"]);

        let uuid = Uuid::new_v4();
        router
            .dispatch("engagement", format!("\"{uuid}\"").as_bytes())
            .await
            .unwrap();
        assert_eq!(mo.calls.lock().unwrap().len(), 1);
    }
}
