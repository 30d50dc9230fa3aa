//! Datadog Agentless Scanning enrollment
//!
//! Create enables scanning for the account (PATCH when it is already
//! enrolled, POST otherwise). Delete removes the enrollment; an account that
//! is already gone counts as deleted.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::datadog::{DatadogClient, JSON_API_CONTENT_TYPE};
use crate::errors::{Error, Result};
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome, ResourceProperties};
use crate::transport::{HttpTransport, Method};

const SCAN_OPTIONS_PATH: &str = "/api/v2/agentless_scanning/accounts/aws";
const CALL_SOURCE: &str = "cfn-agentless-quick-start";

/// Optional resource ARNs, property name → `meta.resources` key
const RESOURCE_FIELDS: [(&str, &str); 8] = [
    ("LaunchTemplateId", "launch_template_id"),
    ("AutoScalingGroupArn", "asg_arn"),
    ("DelegateRoleArn", "delegate_role_arn"),
    ("InstanceRoleArn", "instance_role_arn"),
    ("InstanceProfileArn", "instance_profile_arn"),
    ("OrchestratorPolicyArn", "orchestrator_policy_arn"),
    ("WorkerPolicyArn", "worker_policy_arn"),
    ("WorkerDSPMPolicyArn", "worker_dspm_policy_arn"),
];

pub struct AgentlessScanning {
    transport: Arc<dyn HttpTransport>,
}

impl AgentlessScanning {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn client(&self, properties: &ResourceProperties) -> Result<DatadogClient<'_>> {
        let credentials = super::credentials(properties)?;
        Ok(
            DatadogClient::for_site(self.transport.as_ref(), properties.required_str("DatadogSite")?)
                .authenticated(&credentials)
                .header("Dd-Call-Source", CALL_SOURCE)
                .header(
                    "Dd-Installation-Version",
                    properties.required_str("TemplateVersion")?,
                ),
        )
    }

    /// 200 means enrolled, 404 means not; anything else is an error
    async fn is_enrolled(&self, client: &DatadogClient<'_>, account_id: &str) -> Result<bool> {
        let response = client
            .get(&format!("{}/{}", SCAN_OPTIONS_PATH, account_id))
            .await?;
        match response.status {
            404 => Ok(false),
            _ => response.error_for_status().map(|_| true),
        }
    }
}

fn scan_options(event: &LifecycleEvent) -> Result<Value> {
    let properties = &event.resource_properties;
    let version = properties.required_str("TemplateVersion")?;
    let account_id = properties.required_str("AccountId")?;

    let resources: serde_json::Map<String, Value> = RESOURCE_FIELDS
        .iter()
        .map(|(property, key)| {
            let value = properties
                .get(property)
                .cloned()
                .unwrap_or(Value::Null);
            (key.to_string(), value)
        })
        .collect();

    Ok(json!({
        "meta": {
            "installation_mode": "cloudformation",
            "installation_version": version,
            "cloudformation_stack_id": event.stack_id,
            "resources": resources,
        },
        "data": {
            "id": account_id,
            "type": "aws_scan_options",
            "attributes": {
                "vuln_containers_os": properties.flag("Containers")?,
                "vuln_host_os": properties.flag("Hosts")?,
                "lambda": properties.flag("Lambdas")?,
                "sensitive_data": properties.flag("SensitiveData")?,
            }
        }
    }))
}

#[async_trait]
impl CustomResource for AgentlessScanning {
    fn name(&self) -> &'static str {
        "agentless-scanning"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let account_id = properties.required_str("AccountId")?;
        let body = scan_options(event)?;
        let client = self.client(properties)?;

        let (method, path) = if self.is_enrolled(&client, account_id).await? {
            (Method::Patch, format!("{}/{}", SCAN_OPTIONS_PATH, account_id))
        } else {
            (Method::Post, SCAN_OPTIONS_PATH.to_string())
        };
        info!(method = %method, account_id = %account_id, "Enabling agentless scanning");

        client
            .send_json(method, &path, &body, JSON_API_CONTENT_TYPE)
            .await?
            .error_for_status()?;

        Ok(Outcome::message(
            "Datadog AWS Agentless Scanning Integration created successfully.",
        ))
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::no_op(&event.request_type))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let account_id = properties.required_str("AccountId")?;
        let client = self.client(properties)?;

        let response = client
            .delete(&format!("{}/{}", SCAN_OPTIONS_PATH, account_id))
            .await?;
        if response.status == 404 {
            info!(account_id = %account_id, "Agentless scanning not enabled, nothing to delete");
        } else if !response.is_success() {
            return Err(Error::api(response.status, response.body));
        }

        Ok(Outcome::message(
            "Datadog AWS Agentless Scanning Integration deleted successfully.",
        ))
    }
}
