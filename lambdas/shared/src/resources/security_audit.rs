//! Attaches the AWS managed `SecurityAudit` policy to a role on Create

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::errors::Result;
use crate::iam::{aws_managed_policy_arn, IamApi};
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};

const SECURITY_AUDIT_POLICY: &str = "SecurityAudit";

pub struct SecurityAudit {
    iam: Arc<dyn IamApi>,
}

impl SecurityAudit {
    pub fn new(iam: Arc<dyn IamApi>) -> Self {
        Self { iam }
    }
}

#[async_trait]
impl CustomResource for SecurityAudit {
    fn name(&self) -> &'static str {
        "security-audit"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let role_name = properties.required_str("RoleName")?;
        let policy_arn = aws_managed_policy_arn(properties.required_str("Partition")?, SECURITY_AUDIT_POLICY);

        self.iam.attach_role_policy(role_name, &policy_arn).await?;
        info!(role_name = %role_name, policy_arn = %policy_arn, "Policy added to role");

        Ok(Outcome::message(
            "SecurityAudit policy successfully attached to role.",
        ))
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }
}
