//! Lifecycle routing and the invocation boundary
//!
//! [`handle_event`] is the only place a response envelope is produced. The
//! resource runs in its own task under the invocation's time budget, so
//! errors, unknown verbs, panics and timeouts all end in the same single
//! FAILED report.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::models::{LifecycleEvent, Outcome, RequestType, ResponseEnvelope};
use crate::response::{deliver, Invocation, Reporter};
use crate::transport::HttpTransport;

/// A CloudFormation custom resource backed by this Lambda
#[async_trait]
pub trait CustomResource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome>;

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome>;

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome>;
}

/// Route an event to the matching lifecycle method
pub async fn dispatch(resource: &dyn CustomResource, event: &LifecycleEvent) -> Result<Outcome> {
    match &event.request_type {
        RequestType::Create => resource.create(event).await,
        RequestType::Update => resource.update(event).await,
        RequestType::Delete => resource.delete(event).await,
        RequestType::Other(verb) => Err(Error::UnexpectedRequestType(verb.clone())),
    }
}

/// Run the resource and report the result exactly once
pub async fn handle_event(
    resource: Arc<dyn CustomResource>,
    transport: &dyn HttpTransport,
    event: LifecycleEvent,
    invocation: &Invocation,
) -> Result<ResponseEnvelope> {
    info!(
        resource = resource.name(),
        request_type = %event.request_type,
        logical_resource_id = %event.logical_resource_id,
        "Received lifecycle event"
    );

    let result = run_guarded(resource, event.clone(), invocation.time_budget()).await;

    let reporter = Reporter::new(&event, invocation);
    let envelope = match result {
        Ok(outcome) => {
            info!(request_type = %event.request_type, "Success - lifecycle handler completed");
            reporter.success(outcome)
        }
        Err(e) => {
            error!(error = %e, code = e.code(), "Failed - lifecycle handler returned an error");
            reporter.failure(&e)
        }
    };

    deliver(transport, &event.response_url, &envelope).await?;
    Ok(envelope)
}

async fn run_guarded(
    resource: Arc<dyn CustomResource>,
    event: LifecycleEvent,
    budget: Option<Duration>,
) -> Result<Outcome> {
    let mut task = tokio::spawn(async move { dispatch(resource.as_ref(), &event).await });

    let joined = match budget {
        Some(budget) => match tokio::time::timeout(budget, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(Error::Timeout);
            }
        },
        None => task.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(Error::Internal("handler panicked".to_string())),
        Err(e) => Err(Error::Internal(e.to_string())),
    }
}
