//! Reporting results back to CloudFormation
//!
//! A [`Reporter`] is consumed when it builds the envelope, so a single
//! invocation cannot produce two terminal reports.

use std::time::{Duration, SystemTime};
use tracing::info;

use crate::errors::{Error, Result};
use crate::models::{LifecycleEvent, Outcome, ResponseEnvelope, ResponseStatus};
use crate::settings::Settings;
use crate::transport::{HttpRequest, HttpTransport, Method};

/// Facts about the running Lambda invocation
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub function_arn: String,
    pub log_stream: String,
    pub deadline: Option<SystemTime>,
    pub reporting_margin: Duration,
}

impl Invocation {
    pub fn from_context(context: &lambda_runtime::Context, settings: &Settings) -> Self {
        let deadline = (context.deadline > 0)
            .then(|| SystemTime::UNIX_EPOCH + Duration::from_millis(context.deadline));
        Self {
            function_arn: context.invoked_function_arn.clone(),
            log_stream: settings.log_stream.clone(),
            deadline,
            reporting_margin: settings.reporting_margin,
        }
    }

    /// Time the handler body may run before the callback must go out
    pub fn time_budget(&self) -> Option<Duration> {
        self.deadline.map(|deadline| {
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
                .saturating_sub(self.reporting_margin)
        })
    }
}

/// Builds the one response envelope for an event
pub struct Reporter<'a> {
    event: &'a LifecycleEvent,
    invocation: &'a Invocation,
}

impl<'a> Reporter<'a> {
    pub fn new(event: &'a LifecycleEvent, invocation: &'a Invocation) -> Self {
        Self { event, invocation }
    }

    pub fn success(self, outcome: Outcome) -> ResponseEnvelope {
        let reason = format!(
            "See the details in CloudWatch Log Stream: {}",
            self.invocation.log_stream
        );
        let physical_resource_id = self.physical_resource_id(outcome.physical_resource_id);
        self.envelope(
            ResponseStatus::Success,
            reason,
            physical_resource_id,
            outcome.no_echo,
            outcome.data,
        )
    }

    pub fn failure(self, error: &Error) -> ResponseEnvelope {
        let message = error.to_string();
        let physical_resource_id = self.physical_resource_id(None);
        let data = Outcome::message(message.clone()).data;
        self.envelope(ResponseStatus::Failed, message, physical_resource_id, false, data)
    }

    /// CloudFormation's existing id wins so an update never looks like a replacement
    fn physical_resource_id(&self, from_outcome: Option<String>) -> String {
        self.event
            .physical_resource_id
            .clone()
            .or(from_outcome)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| {
                if self.invocation.function_arn.is_empty() {
                    self.event.logical_resource_id.clone()
                } else {
                    self.invocation.function_arn.clone()
                }
            })
    }

    fn envelope(
        self,
        status: ResponseStatus,
        reason: String,
        physical_resource_id: String,
        no_echo: bool,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> ResponseEnvelope {
        ResponseEnvelope {
            status,
            reason,
            physical_resource_id,
            stack_id: self.event.stack_id.clone(),
            request_id: self.event.request_id.clone(),
            logical_resource_id: self.event.logical_resource_id.clone(),
            no_echo,
            data,
        }
    }
}

/// PUT the envelope to the pre-signed response URL
///
/// The URL is signed without a content type, so none is sent.
pub async fn deliver(
    transport: &dyn HttpTransport,
    response_url: &str,
    envelope: &ResponseEnvelope,
) -> Result<()> {
    let body = serde_json::to_string(envelope)?;

    info!(response_url = %response_url, "Sending response to CloudFormation");
    if envelope.no_echo {
        info!(status = ?envelope.status, reason = %envelope.reason, "Response body withheld (NoEcho)");
    } else {
        info!(body = %body, "Response body");
    }

    let request = HttpRequest::new(Method::Put, response_url)
        .header("Content-Type", "")
        .body(body);
    let response = transport.execute(request).await?;
    info!(status_code = response.status, "CloudFormation response delivered");

    response.error_for_status().map(|_| ())
}
