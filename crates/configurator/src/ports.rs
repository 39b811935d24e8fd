//! Port traits implemented by infrastructure crates.
//!
//! The domain never talks HTTP. It asks [`MoGraphQl`] for exactly the three
//! things the job function rule needs; `mo-graphql` supplies the real
//! implementation and tests supply fakes.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{ClassLookup, ClassUuid, Engagement, EngagementUuid, JobFunction, MoError};

/// Read and write access to the OS2mo domain graph.
#[async_trait]
pub trait MoGraphQl: Send + Sync {
    /// Returns the current registration of an engagement, or `None` if OS2mo
    /// has no current registration for it (terminated, future or deleted).
    async fn engagement(&self, uuid: EngagementUuid) -> Result<Option<Engagement>, MoError>;

    /// Finds the class matching `lookup`, or `None` if the facet has no such class.
    async fn job_function_class(&self, lookup: &ClassLookup)
        -> Result<Option<JobFunction>, MoError>;

    /// Sets the job function of an engagement for the interval `from..=to`.
    ///
    /// `to` must be the engagement's own end date: OS2mo treats an update
    /// without one as open-ended and would drop the existing end date.
    async fn set_job_function(
        &self,
        uuid: EngagementUuid,
        job_function: ClassUuid,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<(), MoError>;
}
