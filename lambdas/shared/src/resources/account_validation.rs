//! Guards a stack against being deployed into the wrong AWS account

use async_trait::async_trait;
use tracing::warn;

use crate::errors::{Error, Result};
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};

pub struct AccountValidation;

impl AccountValidation {
    fn validate(event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let datadog = properties.optional_str("DatadogAccountId").unwrap_or_default();
        let aws = properties.optional_str("AWSAccountId").unwrap_or_default();

        if datadog != aws {
            warn!(datadog_account_id = %datadog, aws_account_id = %aws, "Account ids differ");
            return Err(Error::AccountMismatch {
                datadog: datadog.to_string(),
                aws: aws.to_string(),
            });
        }
        Ok(Outcome::default())
    }
}

#[async_trait]
impl CustomResource for AccountValidation {
    fn name(&self) -> &'static str {
        "account-validation"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Self::validate(event)
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Self::validate(event)
    }

    /// Never blocks teardown
    async fn delete(&self, _event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::default())
    }
}
