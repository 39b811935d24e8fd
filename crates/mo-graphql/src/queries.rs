//! GraphQL documents and their response shapes.
//!
//! Only the fields the job function rule needs are requested. Response types
//! mirror the OS2mo schema and are converted into domain types in
//! [`crate::client`].

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use uuid::Uuid;

pub const ENGAGEMENT_QUERY: &str = r#"
query EngagementJobFunction($uuid: UUID!) {
  engagements(filter: { uuids: [$uuid] }) {
    objects {
      current {
        uuid
        user_key
        validity { from to }
        job_function { uuid user_key name }
        extension_1
        extension_2
        extension_3
        extension_4
        extension_5
        extension_6
        extension_7
        extension_8
        extension_9
        extension_10
      }
    }
  }
}
"#;

pub const CLASS_BY_NAME_QUERY: &str = r#"
query JobFunctionClassByName($facet: String!, $value: String!) {
  classes(filter: { facet: { user_keys: [$facet] }, name: [$value] }) {
    objects {
      current { uuid user_key name }
    }
  }
}
"#;

pub const CLASS_BY_USER_KEY_QUERY: &str = r#"
query JobFunctionClassByUserKey($facet: String!, $value: String!) {
  classes(filter: { facet: { user_keys: [$facet] }, user_keys: [$value] }) {
    objects {
      current { uuid user_key name }
    }
  }
}
"#;

pub const SET_JOB_FUNCTION_MUTATION: &str = r#"
mutation SetJobFunction($input: EngagementUpdateInput!) {
  engagement_update(input: $input) {
    uuid
  }
}
"#;

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// `{ objects: [{ current: T | null }] }`, the paged wrapper every OS2mo
/// collection query returns.
#[derive(Debug, Deserialize)]
pub struct Paged<T> {
    pub objects: Vec<Current<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Current<T> {
    pub current: Option<T>,
}

impl<T> Paged<T> {
    /// All non-null current registrations, in response order.
    pub fn into_current(self) -> impl Iterator<Item = T> {
        self.objects.into_iter().filter_map(|o| o.current)
    }
}

#[derive(Debug, Deserialize)]
pub struct EngagementData {
    pub engagements: Paged<EngagementRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ClassData {
    pub classes: Paged<ClassRecord>,
}

#[derive(Debug, Deserialize)]
pub struct SetJobFunctionData {
    pub engagement_update: UuidRecord,
}

#[derive(Debug, Deserialize)]
pub struct UuidRecord {
    pub uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct Validity {
    pub from: DateTime<FixedOffset>,
    pub to: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassRecord {
    pub uuid: Uuid,
    pub user_key: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EngagementRecord {
    pub uuid: Uuid,
    pub user_key: String,
    pub validity: Validity,
    pub job_function: Option<ClassRecord>,
    /// `extension_1` .. `extension_10`.
    #[serde(flatten)]
    pub extensions: HashMap<String, Option<String>>,
}
