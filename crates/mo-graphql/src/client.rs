//! The GraphQL transport and the [`MoGraphQl`] implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use configurator::{
    ClassLookup, ClassMatch, ClassUuid, Engagement, EngagementUuid, ExtensionField, JobFunction,
    MoError, MoGraphQl,
};

use crate::auth::{AuthConfig, TokenProvider};
use crate::queries::{
    ClassData, ClassRecord, EngagementData, EngagementRecord, SetJobFunctionData,
    CLASS_BY_NAME_QUERY, CLASS_BY_USER_KEY_QUERY, ENGAGEMENT_QUERY, SET_JOB_FUNCTION_MUTATION,
};

/// Connection settings for the OS2mo GraphQL API.
#[derive(Debug, Clone)]
pub struct MoGraphQlConfig {
    /// Base URL of OS2mo, e.g. `http://mo:5000`.
    pub mo_url: String,
    /// GraphQL schema version; the endpoint is `/graphql/v<version>`.
    pub graphql_version: u32,
    /// Per-request timeout, covering token and GraphQL requests.
    pub timeout: Duration,
    pub auth: AuthConfig,
}

impl MoGraphQlConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/graphql/v{}",
            self.mo_url.trim_end_matches('/'),
            self.graphql_version
        )
    }
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// Authenticated client for the OS2mo GraphQL API.
#[derive(Debug)]
pub struct MoGraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenProvider,
}

impl MoGraphQlClient {
    /// Builds the HTTP client. No request is made until the first query.
    pub fn new(config: MoGraphQlConfig) -> Result<Self, MoError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MoError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            endpoint: config.endpoint(),
            tokens: TokenProvider::new(http.clone(), config.auth),
            http,
        })
    }

    /// Runs one GraphQL operation and decodes its `data`.
    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, MoError> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| MoError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(MoError::Authentication {
                message: "OS2mo rejected the access token".into(),
            });
        }
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            let body = response.text().await.unwrap_or_default();
            return Err(MoError::Http {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        let payload: GraphQlResponse<T> = response.json().await.map_err(|e| MoError::Decode {
            message: e.to_string(),
        })?;
        if !payload.errors.is_empty() {
            return Err(MoError::GraphQl {
                messages: payload.errors.into_iter().map(|e| e.message).collect(),
            });
        }
        payload.data.ok_or_else(|| MoError::Decode {
            message: "response carried neither data nor errors".into(),
        })
    }
}

/// Parses `Retry-After` in either form: delta-seconds or an HTTP-date.
/// A date in the past means "retry now".
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn into_job_function(record: ClassRecord) -> JobFunction {
    JobFunction {
        uuid: ClassUuid::new(record.uuid),
        user_key: record.user_key,
        name: record.name,
    }
}

fn into_engagement(record: EngagementRecord) -> Engagement {
    let extensions: BTreeMap<ExtensionField, String> = record
        .extensions
        .into_iter()
        .filter_map(|(key, value)| {
            let field = key.parse::<ExtensionField>().ok()?;
            let value = value.filter(|v| !v.trim().is_empty())?;
            Some((field, value))
        })
        .collect();

    Engagement {
        uuid: EngagementUuid::new(record.uuid),
        user_key: record.user_key,
        validity_from: record.validity.from.date_naive(),
        validity_to: record.validity.to.map(|to| to.date_naive()),
        job_function: record.job_function.map(into_job_function),
        extensions,
    }
}

#[async_trait]
impl MoGraphQl for MoGraphQlClient {
    #[instrument(skip(self))]
    async fn engagement(&self, uuid: EngagementUuid) -> Result<Option<Engagement>, MoError> {
        let data: EngagementData = self
            .execute(ENGAGEMENT_QUERY, json!({ "uuid": uuid }))
            .await?;
        let engagement = data.engagements.into_current().next().map(into_engagement);
        debug!(found = engagement.is_some(), "Fetched engagement");
        Ok(engagement)
    }

    #[instrument(skip(self, lookup), fields(facet = %lookup.facet, value = %lookup.value))]
    async fn job_function_class(
        &self,
        lookup: &ClassLookup,
    ) -> Result<Option<JobFunction>, MoError> {
        let query = match lookup.match_by {
            ClassMatch::Name => CLASS_BY_NAME_QUERY,
            ClassMatch::UserKey => CLASS_BY_USER_KEY_QUERY,
        };
        let data: ClassData = self
            .execute(
                query,
                json!({ "facet": lookup.facet.as_str(), "value": lookup.value }),
            )
            .await?;

        let mut matches = data.classes.into_current();
        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            warn!(extra, "Several classes match; using the first");
        }
        Ok(first.map(into_job_function))
    }

    #[instrument(skip(self))]
    async fn set_job_function(
        &self,
        uuid: EngagementUuid,
        job_function: ClassUuid,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<(), MoError> {
        let input = json!({
            "uuid": uuid,
            "validity": {
                "from": from.format("%Y-%m-%d").to_string(),
                "to": to.map(|to| to.format("%Y-%m-%d").to_string()),
            },
            "job_function": job_function,
        });
        let data: SetJobFunctionData = self
            .execute(SET_JOB_FUNCTION_MUTATION, json!({ "input": input }))
            .await?;
        if data.engagement_update.uuid != uuid.as_uuid() {
            return Err(MoError::Decode {
                message: format!(
                    "engagement_update returned {} for {uuid}",
                    data.engagement_update.uuid
                ),
            });
        }
        Ok(())
    }
}
