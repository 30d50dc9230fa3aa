//! Sets the account-level configuration of the Datadog registry extensions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::errors::Result;
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};
use crate::registry::TypeRegistry;
use crate::secrets::{secret_json, SecretStore};

#[derive(Serialize)]
struct TypeConfigurationDocument {
    #[serde(rename = "DatadogCredentials")]
    credentials: DatadogCredentials,
}

#[derive(Serialize, Deserialize)]
struct DatadogCredentials {
    #[serde(rename = "ApiKey")]
    api_key: String,
    #[serde(rename = "ApplicationKey", alias = "AppKey")]
    application_key: String,
    #[serde(rename = "ApiURL", default, skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,
}

/// Secret layout: `{"ClientRequestToken": {"ApiKey": ..., "AppKey": ...}}`
#[derive(Deserialize)]
struct TokenSecret {
    #[serde(rename = "ClientRequestToken")]
    token: DatadogCredentials,
}

pub struct TypeConfiguration {
    registry: Arc<dyn TypeRegistry>,
    secrets: Arc<dyn SecretStore>,
}

impl TypeConfiguration {
    pub fn new(registry: Arc<dyn TypeRegistry>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { registry, secrets }
    }
}

#[async_trait]
impl CustomResource for TypeConfiguration {
    fn name(&self) -> &'static str {
        "type-configuration"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let type_arn = properties.required_str("TypeARN")?;

        let mut credentials = match properties.optional_str("SecretName") {
            Some(secret_name) => {
                secret_json::<TokenSecret>(self.secrets.as_ref(), secret_name)
                    .await?
                    .token
            }
            None => DatadogCredentials {
                api_key: properties.required_str("APIKey")?.to_string(),
                application_key: properties.required_str("APPKey")?.to_string(),
                api_url: None,
            },
        };
        credentials.api_url = properties.optional_str("ApiURL").map(str::to_string);

        let configuration = serde_json::to_string(&TypeConfigurationDocument { credentials })?;
        self.registry
            .set_type_configuration(type_arn, &configuration)
            .await?;
        info!(type_arn = %type_arn, "Type configuration set");

        Ok(Outcome::message("Type Configuration set correctly."))
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }
}
