//! The job function rule.
//!
//! An engagement's job function is derived from one of its extension
//! attributes: the text stored there names a class in the job function facet.
//! Whenever an engagement changes we re-derive it and write it back if it
//! differs. Writing back triggers a new engagement event, which then finds the
//! job function unchanged; that is what terminates the loop.

use tracing::{debug, info, instrument, warn};

use crate::{ConfiguratorError, EngagementUuid, JobFunctionRules, MoGraphQl, ProcessOutcome};

/// Re-derives and, if needed, writes back the job function of one engagement.
///
/// # Errors
///
/// Returns a [`ConfiguratorError`] when any OS2mo call fails. Missing data
/// (no engagement, no source value, no matching class) is not an error; it is
/// reported through the returned [`ProcessOutcome`].
#[instrument(skip_all, fields(source = %rules.source, facet = %rules.facet))]
pub async fn process_engagement_events(
    mo: &dyn MoGraphQl,
    rules: &JobFunctionRules,
    engagement_uuid: EngagementUuid,
) -> Result<ProcessOutcome, ConfiguratorError> {
    let engagement = mo
        .engagement(engagement_uuid)
        .await
        .map_err(|source| ConfiguratorError::ReadEngagement {
            engagement: engagement_uuid,
            source,
        })?;

    let Some(engagement) = engagement else {
        info!("No current engagement registration; nothing to do");
        return Ok(ProcessOutcome::EngagementNotFound);
    };

    let Some(value) = engagement.extension(rules.source) else {
        debug!("Source extension attribute is empty");
        return Ok(ProcessOutcome::NoSourceValue);
    };

    let lookup = rules.lookup(value);
    let class = mo
        .job_function_class(&lookup)
        .await
        .map_err(|source| ConfiguratorError::LookupJobFunction {
            value: value.to_string(),
            source,
        })?;

    let Some(class) = class else {
        warn!(value, match_by = %rules.match_by, "No job function class matches the extension value");
        return Ok(ProcessOutcome::UnknownJobFunction {
            value: value.to_string(),
        });
    };

    let current = engagement.job_function_uuid();
    if current == Some(class.uuid) {
        debug!(job_function = %class.uuid, "Job function already up to date");
        return Ok(ProcessOutcome::Unchanged);
    }

    if rules.dry_run {
        info!(
            from = ?current,
            to = %class.uuid,
            name = %class.name,
            "Dry run: would update job function"
        );
        return Ok(ProcessOutcome::DryRun {
            job_function: class.uuid,
        });
    }

    mo.set_job_function(
        engagement_uuid,
        class.uuid,
        engagement.validity_from,
        engagement.validity_to,
    )
    .await
    .map_err(|source| ConfiguratorError::WriteJobFunction {
        engagement: engagement_uuid,
        source,
    })?;

    info!(
        from = ?current,
        to = %class.uuid,
        name = %class.name,
        validity_from = %engagement.validity_from,
        validity_to = ?engagement.validity_to,
        "Updated job function"
    );
    Ok(ProcessOutcome::Updated {
        from: current,
        to: class.uuid,
    })
}
