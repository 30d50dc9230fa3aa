//! Deploys the stack that registers the account through the Datadog
//! registry extension, then reads back the external id it generated

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::errors::Result;
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};
use crate::secrets::secret_json;
use crate::stacks::{RegionalClients, StackRequest};

const STACK_NAME: &str = "DatadogAWSIntegrationAPICall";
const EXTERNAL_ID_SECRET: &str = "DatadogIntegrationExternalID";

const TEMPLATE_BODY: &str = r#"AWSTemplateFormatVersion: 2010-09-09
Description: Datadog AWS Integration API Call
Parameters:
  RoleName:
    Description: >-
      The name of the IAM role created for Datadog's use.
    Type: String
  HostTags:
    Type: CommaDelimitedList
    Default: ""
    Description: >-
      A comma separated list of tags to add to hosts and metrics
Resources:
  DatadogAWSAccountIntegration:
    Type: Datadog::Integrations::AWSQuickstart
    Properties:
      AccountID: !Ref AWS::AccountId
      RoleName: !Ref RoleName
      HostTags: !Ref HostTags
"#;

#[derive(Deserialize)]
struct ExternalIdSecret {
    external_id: String,
}

pub struct IntegrationStack {
    regions: Arc<dyn RegionalClients>,
}

impl IntegrationStack {
    pub fn new(regions: Arc<dyn RegionalClients>) -> Self {
        Self { regions }
    }
}

#[async_trait]
impl CustomResource for IntegrationStack {
    fn name(&self) -> &'static str {
        "integration-stack"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let region = properties.required_str("Region")?;
        let role_name = properties.required_str("RoleName")?;
        let host_tags = properties.string_list("HostTags")?.join(",");

        let request = StackRequest {
            stack_name: STACK_NAME.to_string(),
            template_body: TEMPLATE_BODY.to_string(),
            parameters: vec![
                ("RoleName".to_string(), role_name.to_string()),
                ("HostTags".to_string(), host_tags),
            ],
        };
        self.regions.stacks(region).create_stack(&request).await?;

        let secrets = self.regions.secrets(region);
        let secret: ExternalIdSecret = secret_json(secrets.as_ref(), EXTERNAL_ID_SECRET).await?;
        info!(region = %region, stack_name = STACK_NAME, "Integration stack requested");

        Ok(Outcome::message(format!("Stack {} created.", STACK_NAME))
            .with("ExternalID", secret.external_id))
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let region = event.resource_properties.required_str("Region")?;
        self.regions.stacks(region).delete_stack(STACK_NAME).await?;
        Ok(Outcome::message(format!("Stack {} deletion started.", STACK_NAME)))
    }
}
