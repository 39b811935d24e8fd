//! Shared value types for the job function configurator domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the data the job function rule works on: the engagement as read from
//! OS2mo, the job function classes, and the rule configuration.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{ClassUuid, EngagementUuid, FacetUserKey};

// ---------------------------------------------------------------------------
// Extension fields
// ---------------------------------------------------------------------------

/// One of the ten free-text extension attributes on an OS2mo engagement.
///
/// Stored as the attribute number (`1..=10`); displayed and parsed as
/// `extension_<n>`, the GraphQL field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtensionField(u8);

impl ExtensionField {
    /// Every extension field in attribute order.
    pub const ALL: [ExtensionField; 10] = [
        Self(1),
        Self(2),
        Self(3),
        Self(4),
        Self(5),
        Self(6),
        Self(7),
        Self(8),
        Self(9),
        Self(10),
    ];

    /// Creates a field from its attribute number, returning `None` outside `1..=10`.
    pub fn new(number: u8) -> Option<Self> {
        (1..=10).contains(&number).then_some(Self(number))
    }

    /// Returns the attribute number.
    pub fn number(self) -> u8 {
        self.0
    }

    /// Returns the GraphQL field name, e.g. `"extension_3"`.
    pub fn field_name(self) -> String {
        format!("extension_{}", self.0)
    }
}

impl Default for ExtensionField {
    fn default() -> Self {
        Self(1)
    }
}

impl FromStr for ExtensionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix("extension_")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Self::new)
            .ok_or_else(|| format!("expected extension_1 .. extension_10, got '{s}'"))
    }
}

impl TryFrom<String> for ExtensionField {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExtensionField> for String {
    fn from(field: ExtensionField) -> Self {
        field.field_name()
    }
}

impl std::fmt::Display for ExtensionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "extension_{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OS2mo objects
// ---------------------------------------------------------------------------

/// A job function class from the `engagement_job_function` facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFunction {
    pub uuid: ClassUuid,
    pub user_key: String,
    pub name: String,
}

/// The current registration of an engagement, reduced to what the job
/// function rule needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub uuid: EngagementUuid,
    pub user_key: String,
    /// First day of the current validity interval.
    pub validity_from: NaiveDate,
    /// Last day of the current validity interval; `None` means open-ended.
    pub validity_to: Option<NaiveDate>,
    pub job_function: Option<JobFunction>,
    /// Extension attributes that hold a non-blank value.
    pub extensions: BTreeMap<ExtensionField, String>,
}

impl Engagement {
    /// Returns the trimmed value of `field`, or `None` when it is unset or blank.
    pub fn extension(&self, field: ExtensionField) -> Option<&str> {
        self.extensions
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the UUID of the current job function, if any.
    pub fn job_function_uuid(&self) -> Option<ClassUuid> {
        self.job_function.as_ref().map(|jf| jf.uuid)
    }
}

// ---------------------------------------------------------------------------
// Rule configuration
// ---------------------------------------------------------------------------

/// Which class attribute the extension value is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassMatch {
    /// Compare against the class' display name.
    #[default]
    Name,
    /// Compare against the class' user key.
    UserKey,
}

impl FromStr for ClassMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "user_key" | "user-key" => Ok(Self::UserKey),
            other => Err(format!("expected 'name' or 'user_key', got '{other}'")),
        }
    }
}

impl std::fmt::Display for ClassMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::UserKey => write!(f, "user_key"),
        }
    }
}

/// A class lookup request: find the class in a facet whose
/// [`ClassMatch`] attribute equals `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLookup {
    pub facet: FacetUserKey,
    pub match_by: ClassMatch,
    pub value: String,
}

/// Configuration of the job function rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFunctionRules {
    /// Extension attribute holding the job function text.
    pub source: ExtensionField,
    /// Facet the job function classes live in.
    pub facet: FacetUserKey,
    pub match_by: ClassMatch,
    /// Log the intended change instead of writing it.
    pub dry_run: bool,
}

impl JobFunctionRules {
    /// Builds the class lookup for an extension value.
    pub fn lookup(&self, value: &str) -> ClassLookup {
        ClassLookup {
            facet: self.facet.clone(),
            match_by: self.match_by,
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What processing one engagement event resulted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// OS2mo has no current registration for the engagement.
    EngagementNotFound,
    /// The source extension attribute is unset or blank.
    NoSourceValue,
    /// No class in the facet matches the source value.
    UnknownJobFunction { value: String },
    /// The engagement already has the derived job function.
    Unchanged,
    /// The job function would have changed, but dry-run is enabled.
    DryRun { job_function: ClassUuid },
    /// The job function was written back to OS2mo.
    Updated {
        from: Option<ClassUuid>,
        to: ClassUuid,
    },
}

impl ProcessOutcome {
    /// Short label used for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EngagementNotFound => "engagement_not_found",
            Self::NoSourceValue => "no_source_value",
            Self::UnknownJobFunction { .. } => "unknown_job_function",
            Self::Unchanged => "unchanged",
            Self::DryRun { .. } => "dry_run",
            Self::Updated { .. } => "updated",
        }
    }
}
