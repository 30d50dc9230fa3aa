//! Datadog AWS integration through the v1 API
//!
//! Create registers the role, Delete removes it. Update is not supported by
//! the v1 endpoint and is acknowledged without a call.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::datadog::{DatadogClient, JSON_CONTENT_TYPE};
use crate::errors::{Error, Result};
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};
use crate::transport::{HttpTransport, Method};

const INTEGRATION_PATH: &str = "/api/v1/integration/aws";

pub struct LegacyIntegration {
    transport: Arc<dyn HttpTransport>,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    account_id: &'a str,
    role_name: &'a str,
    host_tags: Vec<String>,
    cspm_resource_collection_enabled: bool,
    metrics_collection_enabled: bool,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    account_id: &'a str,
    role_name: &'a str,
}

impl LegacyIntegration {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn client(&self, event: &LifecycleEvent) -> Result<DatadogClient<'_>> {
        let properties = &event.resource_properties;
        let credentials = super::credentials(properties)?;
        let site = properties.required_str("ApiURL")?;
        Ok(DatadogClient::for_site(self.transport.as_ref(), site).authenticated(&credentials))
    }
}

#[async_trait]
impl CustomResource for LegacyIntegration {
    fn name(&self) -> &'static str {
        "legacy-integration"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let client = self.client(event)?;
        let request = RegisterRequest {
            account_id: properties.required_str("AccountId")?,
            role_name: properties.required_str("RoleName")?,
            host_tags: properties.string_list("HostTags")?,
            cspm_resource_collection_enabled: properties.flag("CloudSecurityPostureManagement")?,
            metrics_collection_enabled: !properties.flag("DisableMetricCollection")?,
        };

        info!(account_id = %request.account_id, "Registering AWS account with Datadog");
        let response = client
            .send_json(Method::Post, INTEGRATION_PATH, &request, JSON_CONTENT_TYPE)
            .await?
            .error_for_status()?;

        let body: Value = response.json()?;
        let external_id = body
            .get("external_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Internal("Datadog API response did not include an external ID".to_string()))?;

        Ok(Outcome::message("Datadog AWS Integration created successfully.")
            .with("ExternalId", external_id))
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let client = self.client(event)?;
        let request = RemoveRequest {
            account_id: properties.required_str("AccountId")?,
            role_name: properties.required_str("RoleName")?,
        };

        let response = client.delete_json(INTEGRATION_PATH, &request).await?;
        if response.is_client_error() {
            warn!(status = response.status, body = %response.body, "Delete rejected, continuing");
            return Ok(Outcome::message(format!(
                "Datadog API returned {} on delete; continuing.",
                response.status
            )));
        }
        response.error_for_status()?;

        Ok(Outcome::message("Datadog AWS Integration deleted successfully."))
    }
}
