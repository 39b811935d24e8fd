//! OS2mo GraphQL client adapter.
//!
//! Implements the [`configurator::MoGraphQl`] trait against the OS2mo GraphQL
//! API (`/graphql/v<n>`), authenticating with OAuth2 client credentials
//! against the Keycloak realm in front of OS2mo.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, token caching, query documents,
//! response decoding and error classification all live here. The
//! [`configurator`] crate sees only [`configurator::MoGraphQl`] and
//! [`configurator::MoError`].

pub mod auth;
pub mod client;
pub mod queries;

pub use auth::{AuthConfig, TokenProvider};
pub use client::{MoGraphQlClient, MoGraphQlConfig};
