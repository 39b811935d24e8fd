//! Core domain for the OS2mo job function configurator.
//!
//! This crate contains the engagement and job function types, the job function
//! rule ([`process_engagement_events`]), and the [`MoGraphQl`] port the rule
//! reads and writes through. Infrastructure crates implement the port; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | UUID newtypes (`EngagementUuid`, `ClassUuid`) and `FacetUserKey` |
//! | [`types`] | `Engagement`, `JobFunction`, `JobFunctionRules`, `ProcessOutcome` |
//! | [`errors`] | `MoError`, `ConfiguratorError`, `RetryPolicy` |
//! | [`ports`] | The `MoGraphQl` trait |
//! | [`process`] | `process_engagement_events` |

pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod process;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ConfiguratorError, MoError, RetryPolicy};
pub use identifiers::{ClassUuid, EngagementUuid, FacetUserKey};
pub use ports::MoGraphQl;
pub use process::process_engagement_events;
pub use types::{
    ClassLookup, ClassMatch, Engagement, ExtensionField, JobFunction, JobFunctionRules,
    ProcessOutcome,
};
