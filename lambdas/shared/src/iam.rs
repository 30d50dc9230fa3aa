//! IAM operations
//!
//! [`IamApi`] is the seam handlers use; [`IamClient`] implements it over the
//! AWS SDK. Cleanup is lenient: a policy that is already gone (or still
//! attached elsewhere) is not an error, and other failures are logged and
//! skipped so stack teardown is never blocked.

use async_trait::async_trait;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::Client;
use md5::{Digest, Md5};
use tracing::{error, info};

use crate::errors::{Error, Result};

#[async_trait]
pub trait IamApi: Send + Sync {
    /// Put an inline policy on a role
    async fn put_role_policy(&self, role_name: &str, policy_name: &str, document: &str)
        -> Result<()>;

    /// Create a customer managed policy, returning its ARN
    async fn create_policy(&self, policy_name: &str, document: &str) -> Result<String>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn delete_policy(&self, policy_arn: &str) -> Result<()>;
}

/// AWS SDK implementation of [`IamApi`]
pub struct IamClient {
    client: Client,
}

impl IamClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IamApi for IamClient {
    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<()> {
        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn create_policy(&self, policy_name: &str, document: &str) -> Result<String> {
        let output = self
            .client
            .create_policy()
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;

        output
            .policy()
            .and_then(|policy| policy.arn())
            .map(str::to_string)
            .ok_or_else(|| Error::Aws(format!("CreatePolicy returned no ARN for {}", policy_name)))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| Error::Aws(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_no_such_entity_exception())
                {
                    Error::NoSuchEntity(policy_arn.to_string())
                } else {
                    Error::Aws(DisplayErrorContext(&e).to_string())
                }
            })?;
        Ok(())
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        self.client
            .delete_policy()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_entity_exception() => {
                    Error::NoSuchEntity(policy_arn.to_string())
                }
                Some(se) if se.is_delete_conflict_exception() => {
                    Error::DeleteConflict(policy_arn.to_string())
                }
                _ => Error::Aws(DisplayErrorContext(&e).to_string()),
            })?;
        Ok(())
    }
}

/// ARN of a customer managed policy
pub fn managed_policy_arn(partition: &str, account_id: &str, policy_name: &str) -> String {
    format!("arn:{}:iam::{}:policy/{}", partition, account_id, policy_name)
}

/// ARN of an AWS managed policy such as `SecurityAudit`
pub fn aws_managed_policy_arn(partition: &str, policy_name: &str) -> String {
    format!("arn:{}:iam::aws:policy/{}", partition, policy_name)
}

/// `{base}-{hash}` where the hash is the first 8 hex digits of
/// `md5("{role_name}-{account_id}")`
///
/// Stacks deployed from the older templates named their policies this way,
/// so the prefix has to match byte for byte for cleanup to find them.
pub fn hashed_prefix(base: &str, role_name: &str, account_id: &str) -> String {
    let digest = Md5::digest(format!("{}-{}", role_name, account_id).as_bytes());
    let hex = format!("{:x}", digest);
    format!("{}-{}", base, &hex[..8])
}

/// A family of `{prefix}-part{n}` managed policies in one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    pub prefix: String,
    pub partition: String,
    pub account_id: String,
    /// Highest part number ever created; cleanup walks all of them
    pub max_policies: usize,
}

impl PolicySet {
    /// Name of the zero-based `index`th policy
    pub fn policy_name(&self, index: usize) -> String {
        format!("{}-part{}", self.prefix, index + 1)
    }

    pub fn policy_arn(&self, index: usize) -> String {
        managed_policy_arn(&self.partition, &self.account_id, &self.policy_name(index))
    }

    /// Detach and delete every part from `role_name`
    pub async fn cleanup(&self, iam: &dyn IamApi, role_name: &str) {
        for index in 0..self.max_policies {
            let policy_name = self.policy_name(index);
            let policy_arn = self.policy_arn(index);

            match iam.detach_role_policy(role_name, &policy_arn).await {
                Ok(()) => info!(policy_name = %policy_name, "Detached policy"),
                Err(e) if e.tolerated_during_cleanup() => {}
                Err(e) => error!(policy_name = %policy_name, error = %e, "Error detaching policy"),
            }

            match iam.delete_policy(&policy_arn).await {
                Ok(()) => info!(policy_name = %policy_name, "Deleted policy"),
                Err(e) if e.tolerated_during_cleanup() => {}
                Err(e) => error!(policy_name = %policy_name, error = %e, "Error deleting policy"),
            }
        }
    }
}
