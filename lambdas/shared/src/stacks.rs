//! CloudFormation stack operations in a caller-chosen region

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::config::Region;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::types::Parameter;
use std::sync::Arc;
use tracing::info;

use crate::errors::{Error, Result};
use crate::secrets::{SecretStore, SecretsManagerStore};

/// A stack to create from an inline template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    /// `(ParameterKey, ParameterValue)` pairs
    pub parameters: Vec<(String, String)>,
}

#[async_trait]
pub trait StackApi: Send + Sync {
    /// Start creating a stack; does not wait for completion
    async fn create_stack(&self, request: &StackRequest) -> Result<()>;

    async fn delete_stack(&self, stack_name: &str) -> Result<()>;
}

/// Builds stack and secret clients for the region named in a request
pub trait RegionalClients: Send + Sync {
    fn stacks(&self, region: &str) -> Arc<dyn StackApi>;

    fn secrets(&self, region: &str) -> Arc<dyn SecretStore>;
}

pub struct CloudFormationStacks {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationStacks {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackApi for CloudFormationStacks {
    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        let parameters = request
            .parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect::<Vec<_>>();

        let output = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(parameters))
            .send()
            .await
            .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;

        info!(
            stack_name = %request.stack_name,
            stack_id = output.stack_id().unwrap_or_default(),
            "Stack creation started"
        );
        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;
        info!(stack_name = %stack_name, "Stack deletion started");
        Ok(())
    }
}

/// SDK clients derived from the Lambda's shared config with the region overridden
pub struct SdkRegionalClients {
    config: SdkConfig,
}

impl SdkRegionalClients {
    pub fn new(config: SdkConfig) -> Self {
        Self { config }
    }
}

impl RegionalClients for SdkRegionalClients {
    fn stacks(&self, region: &str) -> Arc<dyn StackApi> {
        let config = aws_sdk_cloudformation::config::Builder::from(&self.config)
            .region(Region::new(region.to_string()))
            .build();
        Arc::new(CloudFormationStacks::new(
            aws_sdk_cloudformation::Client::from_conf(config),
        ))
    }

    fn secrets(&self, region: &str) -> Arc<dyn SecretStore> {
        let config = aws_sdk_secretsmanager::config::Builder::from(&self.config)
            .region(aws_sdk_secretsmanager::config::Region::new(region.to_string()))
            .build();
        Arc::new(SecretsManagerStore::new(
            aws_sdk_secretsmanager::Client::from_conf(config),
        ))
    }
}
