//! Lambda runtime glue shared by every function binary

use lambda_runtime::{service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::errors::Error;
use crate::lifecycle::{handle_event, CustomResource};
use crate::models::LifecycleEvent;
use crate::response::{deliver, Invocation, Reporter};
use crate::settings::Settings;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Per-request HTTP timeout; the Lambda deadline still bounds the whole run
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// CloudWatch adds timestamps, so lines carry none
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();
}

pub fn default_transport() -> crate::Result<Arc<dyn HttpTransport>> {
    Ok(Arc::new(ReqwestTransport::new(HTTP_TIMEOUT)?))
}

/// Serve `resource` until the runtime shuts down
pub async fn serve(
    resource: Arc<dyn CustomResource>,
    transport: Arc<dyn HttpTransport>,
    settings: Settings,
) -> Result<(), LambdaError> {
    let settings = Arc::new(settings);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let resource = resource.clone();
        let transport = transport.clone();
        let settings = settings.clone();
        async move { handle_invocation(resource, transport, &settings, event).await }
    }))
    .await
}

async fn handle_invocation(
    resource: Arc<dyn CustomResource>,
    transport: Arc<dyn HttpTransport>,
    settings: &Settings,
    event: LambdaEvent<Value>,
) -> Result<(), LambdaError> {
    let (payload, context) = event.into_parts();
    let invocation = Invocation::from_context(&context, settings);

    let event = match serde_json::from_value::<LifecycleEvent>(payload.clone()) {
        Ok(event) => event,
        Err(e) => {
            report_malformed(transport.as_ref(), &payload, e, &invocation).await?;
            return Ok(());
        }
    };

    handle_event(resource, transport.as_ref(), event, &invocation).await?;
    Ok(())
}

/// FAILED report for a request that does not deserialize
///
/// Without a ResponseURL there is nobody to report to, so the invocation
/// itself fails instead.
async fn report_malformed(
    transport: &dyn HttpTransport,
    payload: &Value,
    parse_error: serde_json::Error,
    invocation: &Invocation,
) -> crate::Result<()> {
    error!(error = %parse_error, "Event is not a well-formed CloudFormation custom resource request");
    let Some(event) = LifecycleEvent::salvage(payload) else {
        return Err(parse_error.into());
    };

    let envelope = Reporter::new(&event, invocation)
        .failure(&Error::MalformedEvent(parse_error.to_string()));
    deliver(transport, &event.response_url, &envelope).await
}
