//! CloudFormation registry access

use async_trait::async_trait;
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::Client;

use crate::errors::{Error, Result};

#[async_trait]
pub trait TypeRegistry: Send + Sync {
    /// Set the account-level configuration of a registered extension
    async fn set_type_configuration(&self, type_arn: &str, configuration: &str) -> Result<()>;
}

pub struct CloudFormationRegistry {
    client: Client,
}

impl CloudFormationRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TypeRegistry for CloudFormationRegistry {
    async fn set_type_configuration(&self, type_arn: &str, configuration: &str) -> Result<()> {
        self.client
            .set_type_configuration()
            .type_arn(type_arn)
            .configuration(configuration)
            .send()
            .await
            .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
