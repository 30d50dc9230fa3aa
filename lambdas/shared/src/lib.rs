//! Datadog CloudFormation Core Library
//!
//! Shared functionality for the Datadog custom resource Lambda functions:
//! - Lifecycle routing and the single-report invocation boundary
//! - Response envelopes for the CloudFormation callback
//! - Idempotent upsert planning
//! - IAM policy chunking
//! - Datadog API and AWS control-plane clients
//! - The custom resources themselves

pub mod chunker;
pub mod datadog;
pub mod errors;
pub mod iam;
pub mod lifecycle;
pub mod models;
pub mod registry;
pub mod resources;
pub mod response;
pub mod runtime;
pub mod secrets;
pub mod settings;
pub mod stacks;
pub mod transport;
pub mod upsert;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{PolicyChunker, PolicyDocument};
pub use errors::{Error, Result};
pub use lifecycle::{dispatch, handle_event, CustomResource};
pub use models::*;
pub use settings::Settings;
pub use upsert::{plan_upsert, LookupOutcome, UpsertMethod, UpsertResult};
