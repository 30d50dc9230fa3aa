//! Hands Datadog credentials to the rest of the stack as resource attributes
//!
//! Keys come from the template, or from a Secrets Manager secret when
//! `SecretName` is set. The response is marked NoEcho.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::datadog::site_for_datacenter;
use crate::errors::Result;
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};
use crate::secrets::{secret_json, SecretStore};

/// Shape of the Datadog-provisioned credentials secret
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatadogSecret {
    api_key: String,
    application_key: String,
    datacenter: String,
}

pub struct CredentialRetrieval {
    secrets: Arc<dyn SecretStore>,
}

impl CredentialRetrieval {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl CustomResource for CredentialRetrieval {
    fn name(&self) -> &'static str {
        "credential-retrieval"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;

        let (api_key, app_key, api_url) = match properties.optional_str("SecretName") {
            Some(secret_name) => {
                info!(secret_name = %secret_name, "Reading credentials from Secrets Manager");
                let secret: DatadogSecret = secret_json(self.secrets.as_ref(), secret_name).await?;
                let site = site_for_datacenter(&secret.datacenter)?;
                (secret.api_key, secret.application_key, site.to_string())
            }
            None => (
                properties.required_str("APIKey")?.to_string(),
                properties.required_str("APPKey")?.to_string(),
                properties.required_str("ApiURL")?.to_string(),
            ),
        };

        Ok(Outcome::message("Type Configuration set correctly.")
            .with("ApiKey", api_key)
            .with("AppKey", app_key)
            .with("ApiUrl", api_url)
            .sensitive())
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }
}
