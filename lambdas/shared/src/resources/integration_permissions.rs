//! IAM permissions for the Datadog integration role
//!
//! Two policy layouts are supported. The split layout puts the standard list
//! in one inline policy and chunks the resource collection list by size into
//! `-partN` managed policies. The hashed layout, used by the older templates,
//! chunks the single combined list by count under a prefix derived from the
//! role and account. Create and Update rebuild from the published lists;
//! Delete only cleans up.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::chunker::{chunk_by_count, PolicyChunker, PolicyDocument};
use crate::datadog::DatadogClient;
use crate::errors::{Error, Result};
use crate::iam::{hashed_prefix, IamApi, PolicySet};
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};
use crate::settings::Settings;
use crate::transport::HttpTransport;

const CALL_SOURCE: &str = "cfn-iam-permissions";
const STANDARD_POLICY_NAME: &str = "DatadogAWSIntegrationPolicy";
const RESOURCE_COLLECTION_PREFIX: &str = "datadog-aws-integration-resource-collection-permissions";
const HASHED_PREFIX_BASE: &str = "datadog-aws-integration-iam-permissions";
/// Permissions per managed policy in the hashed layout
const PERMISSIONS_PER_POLICY: usize = 150;
const DEFAULT_PARTITION: &str = "aws";

#[derive(Deserialize)]
struct PermissionsResponse {
    data: PermissionsData,
}

#[derive(Deserialize)]
struct PermissionsData {
    attributes: PermissionsAttributes,
}

#[derive(Deserialize)]
struct PermissionsAttributes {
    permissions: Vec<String>,
}

/// How the permission lists map onto the role's policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionsLayout {
    /// Inline `standard` policy plus size-chunked `resource_collection` parts
    Split,
    /// The combined list in fixed-count parts under a role/account hash
    Hashed,
}

pub struct IntegrationPermissions {
    transport: Arc<dyn HttpTransport>,
    iam: Arc<dyn IamApi>,
    layout: PermissionsLayout,
    permissions_api_url: String,
    chunker: PolicyChunker,
    max_policies: usize,
}

impl IntegrationPermissions {
    pub fn new(transport: Arc<dyn HttpTransport>, iam: Arc<dyn IamApi>, settings: &Settings) -> Self {
        Self::with_layout(transport, iam, settings, PermissionsLayout::Split)
    }

    /// The hash-named, count-chunked layout
    pub fn hashed(transport: Arc<dyn HttpTransport>, iam: Arc<dyn IamApi>, settings: &Settings) -> Self {
        Self::with_layout(transport, iam, settings, PermissionsLayout::Hashed)
    }

    fn with_layout(
        transport: Arc<dyn HttpTransport>,
        iam: Arc<dyn IamApi>,
        settings: &Settings,
        layout: PermissionsLayout,
    ) -> Self {
        Self {
            transport,
            iam,
            layout,
            permissions_api_url: settings.permissions_api_url.clone(),
            chunker: PolicyChunker::new(settings.max_policy_size),
            max_policies: settings.max_policies,
        }
    }

    fn policy_set(&self, event: &LifecycleEvent, role_name: &str) -> Result<PolicySet> {
        let properties = &event.resource_properties;
        let account_id = properties.required_str("AccountId")?;
        let prefix = match self.layout {
            PermissionsLayout::Split => RESOURCE_COLLECTION_PREFIX.to_string(),
            PermissionsLayout::Hashed => hashed_prefix(HASHED_PREFIX_BASE, role_name, account_id),
        };
        Ok(PolicySet {
            prefix,
            partition: properties
                .optional_str("Partition")
                .unwrap_or(DEFAULT_PARTITION)
                .to_string(),
            account_id: account_id.to_string(),
            max_policies: self.max_policies,
        })
    }

    /// GET `{permissions_api_url}{path}`
    async fn fetch_permissions(&self, path: &str) -> Result<Vec<String>> {
        let client = DatadogClient::with_base_url(self.transport.as_ref(), self.permissions_api_url.as_str())
            .call_source(CALL_SOURCE);
        let response = client.get(path).await?.error_for_status()?;
        let parsed: PermissionsResponse = response.json()?;
        Ok(parsed.data.attributes.permissions)
    }

    async fn attach_standard(&self, role_name: &str) -> Result<()> {
        let permissions = self.fetch_permissions("/standard").await?;
        let document = PolicyDocument::allow(&permissions).to_json()?;
        self.iam
            .put_role_policy(role_name, STANDARD_POLICY_NAME, &document)
            .await?;
        info!(policy_name = STANDARD_POLICY_NAME, permissions = permissions.len(), "Attached inline policy");
        Ok(())
    }

    /// Create and attach one managed policy per chunk
    async fn attach_chunks(
        &self,
        role_name: &str,
        policies: &PolicySet,
        chunks: &[Vec<String>],
    ) -> Result<()> {
        for (index, chunk) in chunks.iter().enumerate() {
            let policy_name = policies.policy_name(index);
            let document = PolicyDocument::allow(chunk).to_json()?;
            info!(
                policy_name = %policy_name,
                permissions = chunk.len(),
                size = document.len(),
                "Creating policy"
            );
            let policy_arn = self.iam.create_policy(&policy_name, &document).await?;
            self.iam.attach_role_policy(role_name, &policy_arn).await?;
        }
        Ok(())
    }

    async fn rebuild_split(&self, role_name: &str, policies: &PolicySet) -> Result<Outcome> {
        policies.cleanup(self.iam.as_ref(), role_name).await;
        self.attach_standard(role_name).await?;

        let permissions = self.fetch_permissions("/resource_collection").await?;
        let chunks = self.chunker.chunk(&permissions)?;
        check_policy_count(&chunks, policies)?;
        info!(chunks = chunks.len(), permissions = permissions.len(), "Created policy chunks");
        self.attach_chunks(role_name, policies, &chunks).await?;

        Ok(Outcome::message(format!(
            "Attached {} and {} resource collection policies to {}.",
            STANDARD_POLICY_NAME,
            chunks.len(),
            role_name
        )))
    }

    /// Fetch and chunk before touching IAM, so a bad fetch leaves the old policies in place
    async fn rebuild_hashed(&self, role_name: &str, policies: &PolicySet) -> Result<Outcome> {
        let permissions = self.fetch_permissions("").await?;
        let chunks = chunk_by_count(&permissions, PERMISSIONS_PER_POLICY);
        check_policy_count(&chunks, policies)?;
        info!(chunks = chunks.len(), permissions = permissions.len(), "Created policy chunks");

        policies.cleanup(self.iam.as_ref(), role_name).await;
        self.attach_chunks(role_name, policies, &chunks).await?;
        Ok(Outcome::default())
    }

    async fn rebuild(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let role_name = event.resource_properties.required_str("DatadogIntegrationRole")?;
        let policies = self.policy_set(event, role_name)?;

        match self.layout {
            PermissionsLayout::Split => self.rebuild_split(role_name, &policies).await,
            PermissionsLayout::Hashed => self.rebuild_hashed(role_name, &policies).await,
        }
    }
}

/// Parts past `max_policies` would be invisible to a later cleanup
fn check_policy_count(chunks: &[Vec<String>], policies: &PolicySet) -> Result<()> {
    if chunks.len() > policies.max_policies {
        return Err(Error::TooManyPolicies {
            count: chunks.len(),
            max: policies.max_policies,
        });
    }
    Ok(())
}

#[async_trait]
impl CustomResource for IntegrationPermissions {
    fn name(&self) -> &'static str {
        match self.layout {
            PermissionsLayout::Split => "integration-permissions",
            PermissionsLayout::Hashed => "integration-permissions-hashed",
        }
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        self.rebuild(event).await
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        self.rebuild(event).await
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let role_name = event.resource_properties.required_str("DatadogIntegrationRole")?;
        self.policy_set(event, role_name)?
            .cleanup(self.iam.as_ref(), role_name)
            .await;
        Ok(Outcome::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::handle_event;
    use crate::models::{RequestType, ResponseEnvelope, ResponseStatus};
    use crate::response::Invocation;
    use crate::testing::{event, IamCall, InMemoryIam, ScriptedTransport};
    use crate::transport::{HttpResponse, Method};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ROLE: &str = "DatadogIntegrationRole";

    fn permissions_response(permissions: &[String]) -> HttpResponse {
        HttpResponse::new(
            200,
            json!({"data": {
                "id": "permissions",
                "type": "permissions",
                "attributes": {"permissions": permissions}
            }})
            .to_string(),
        )
    }

    fn permissions(prefix: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("{}:Describe{:05}", prefix, i))
            .collect()
    }

    fn settings() -> Settings {
        Settings {
            permissions_api_url: "https://api.datadoghq.com/api/v2/integration/aws/iam_permissions".into(),
            max_policies: 4,
            ..Settings::default()
        }
    }

    async fn run(
        request_type: RequestType,
        responses: Vec<HttpResponse>,
        iam: Arc<InMemoryIam>,
        settings: Settings,
    ) -> (Arc<ScriptedTransport>, ResponseEnvelope) {
        run_layout(PermissionsLayout::Split, request_type, responses, iam, settings).await
    }

    async fn run_layout(
        layout: PermissionsLayout,
        request_type: RequestType,
        responses: Vec<HttpResponse>,
        iam: Arc<InMemoryIam>,
        settings: Settings,
    ) -> (Arc<ScriptedTransport>, ResponseEnvelope) {
        let transport = Arc::new(ScriptedTransport::new(responses));
        let resource = Arc::new(IntegrationPermissions::with_layout(
            transport.clone(),
            iam,
            &settings,
            layout,
        ));
        let envelope = handle_event(
            resource,
            transport.as_ref(),
            event(
                request_type,
                json!({"DatadogIntegrationRole": ROLE, "AccountId": "123456789012"}),
            ),
            &Invocation::default(),
        )
        .await
        .unwrap();
        (transport, envelope)
    }

    #[tokio::test]
    async fn test_create_attaches_standard_and_chunked_policies() {
        let iam = Arc::new(InMemoryIam::new());
        let standard = permissions("ec2", 10);
        let resource_collection = permissions("resource-collection", 400);

        let (transport, envelope) = run(
            RequestType::Create,
            vec![
                permissions_response(&standard),
                permissions_response(&resource_collection),
            ],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Success);

        let requests = transport.requests();
        assert_eq!(transport.methods(), vec![Method::Get, Method::Get]);
        assert_eq!(
            requests[0].url,
            "https://api.datadoghq.com/api/v2/integration/aws/iam_permissions/standard"
        );
        assert_eq!(
            requests[1].url,
            "https://api.datadoghq.com/api/v2/integration/aws/iam_permissions/resource_collection"
        );
        assert_eq!(requests[0].header_value("Dd-Aws-Api-Call-Source"), Some(CALL_SOURCE));

        let inline = iam.inline_policy(ROLE, STANDARD_POLICY_NAME).unwrap();
        assert_eq!(inline, PolicyDocument::allow(&standard).to_json().unwrap());

        let managed = iam.managed_policies();
        assert!(managed.len() > 1);
        let mut rebuilt = Vec::new();
        for (index, (name, document)) in managed.iter().enumerate() {
            assert_eq!(
                name,
                &format!("{}-part{}", RESOURCE_COLLECTION_PREFIX, index + 1)
            );
            assert!(document.len() <= settings().max_policy_size);
            let parsed: serde_json::Value = serde_json::from_str(document).unwrap();
            for action in parsed["Statement"][0]["Action"].as_array().unwrap() {
                rebuilt.push(action.as_str().unwrap().to_string());
            }
        }
        assert_eq!(rebuilt, resource_collection);
        assert_eq!(iam.attached(ROLE).len(), managed.len());
    }

    #[tokio::test]
    async fn test_update_replaces_previous_policies() {
        let iam = Arc::new(InMemoryIam::new());
        let stale = iam
            .create_policy(&format!("{}-part1", RESOURCE_COLLECTION_PREFIX), "{}")
            .await
            .unwrap();
        iam.attach_role_policy(ROLE, &stale).await.unwrap();

        let (_, envelope) = run(
            RequestType::Update,
            vec![
                permissions_response(&permissions("ec2", 2)),
                permissions_response(&permissions("s3", 3)),
            ],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Success);
        let managed = iam.managed_policies();
        assert_eq!(managed.len(), 1);
        assert!(managed.values().next().unwrap().contains("s3:Describe00002"));

        let calls = iam.calls();
        let first_delete = calls
            .iter()
            .position(|call| matches!(call, IamCall::DeletePolicy { .. }))
            .unwrap();
        let last_create = calls
            .iter()
            .rposition(|call| matches!(call, IamCall::CreatePolicy { .. }))
            .unwrap();
        assert!(first_delete < last_create);
    }

    #[tokio::test]
    async fn test_too_many_chunks_fails_before_creating() {
        let iam = Arc::new(InMemoryIam::new());
        let settings = Settings {
            max_policy_size: 200,
            max_policies: 2,
            ..settings()
        };

        let (_, envelope) = run(
            RequestType::Create,
            vec![
                permissions_response(&permissions("ec2", 1)),
                permissions_response(&permissions("resource-collection", 50)),
            ],
            iam.clone(),
            settings,
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Failed);
        assert!(envelope.reason.contains("exceed the maximum of 2"));
        assert!(iam.managed_policies().is_empty());
    }

    #[tokio::test]
    async fn test_permissions_api_error_fails() {
        let iam = Arc::new(InMemoryIam::new());
        let (_, envelope) = run(
            RequestType::Create,
            vec![HttpResponse::new(503, "unavailable")],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Failed);
        assert_eq!(iam.inline_policy(ROLE, STANDARD_POLICY_NAME), None);
    }

    #[tokio::test]
    async fn test_attach_failure_reports_failure() {
        let iam = Arc::new(InMemoryIam::new());
        iam.fail_attaches_with("AccessDenied");
        let (_, envelope) = run(
            RequestType::Create,
            vec![
                permissions_response(&permissions("ec2", 1)),
                permissions_response(&permissions("s3", 1)),
            ],
            iam,
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Failed);
        assert!(envelope.reason.contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_delete_cleans_up_every_part() {
        let iam = Arc::new(InMemoryIam::new());
        for part in 1..=2 {
            let arn = iam
                .create_policy(&format!("{}-part{}", RESOURCE_COLLECTION_PREFIX, part), "{}")
                .await
                .unwrap();
            iam.attach_role_policy(ROLE, &arn).await.unwrap();
        }

        let (transport, envelope) = run(RequestType::Delete, vec![], iam.clone(), settings()).await;

        assert_eq!(envelope.status, ResponseStatus::Success);
        assert!(transport.requests().is_empty());
        assert!(iam.managed_policies().is_empty());
        assert!(iam.attached(ROLE).is_empty());
        let deletes = iam
            .calls()
            .into_iter()
            .filter(|call| matches!(call, IamCall::DeletePolicy { .. }))
            .count();
        assert_eq!(deletes, settings().max_policies);
    }

    #[tokio::test]
    async fn test_delete_with_nothing_attached_succeeds() {
        let iam = Arc::new(InMemoryIam::new());
        let (_, envelope) = run(RequestType::Delete, vec![], iam, settings()).await;
        assert_eq!(envelope.status, ResponseStatus::Success);
    }

    const HASHED_PREFIX: &str = "datadog-aws-integration-iam-permissions-e265ea76";

    #[tokio::test]
    async fn test_hashed_create_chunks_by_count() {
        let iam = Arc::new(InMemoryIam::new());
        let all = permissions("ec2", 320);

        let (transport, envelope) = run_layout(
            PermissionsLayout::Hashed,
            RequestType::Create,
            vec![permissions_response(&all)],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Success);
        assert!(envelope.data.is_empty());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://api.datadoghq.com/api/v2/integration/aws/iam_permissions"
        );
        assert_eq!(requests[0].header_value("Dd-Aws-Api-Call-Source"), Some(CALL_SOURCE));

        assert_eq!(iam.inline_policy(ROLE, STANDARD_POLICY_NAME), None);
        let managed = iam.managed_policies();
        let names: Vec<&String> = managed.keys().collect();
        assert_eq!(
            names,
            vec![
                &format!("{}-part1", HASHED_PREFIX),
                &format!("{}-part2", HASHED_PREFIX),
                &format!("{}-part3", HASHED_PREFIX),
            ]
        );
        let sizes: Vec<usize> = managed
            .values()
            .map(|document| {
                let parsed: serde_json::Value = serde_json::from_str(document).unwrap();
                parsed["Statement"][0]["Action"].as_array().unwrap().len()
            })
            .collect();
        assert_eq!(sizes, vec![150, 150, 20]);
        assert_eq!(
            iam.attached(ROLE),
            vec![
                format!("arn:aws:iam::123456789012:policy/{}-part1", HASHED_PREFIX),
                format!("arn:aws:iam::123456789012:policy/{}-part2", HASHED_PREFIX),
                format!("arn:aws:iam::123456789012:policy/{}-part3", HASHED_PREFIX),
            ]
        );
    }

    #[tokio::test]
    async fn test_hashed_fetch_failure_leaves_policies_alone() {
        let iam = Arc::new(InMemoryIam::new());
        let existing = iam
            .create_policy(&format!("{}-part1", HASHED_PREFIX), "{}")
            .await
            .unwrap();
        iam.attach_role_policy(ROLE, &existing).await.unwrap();

        let (_, envelope) = run_layout(
            PermissionsLayout::Hashed,
            RequestType::Update,
            vec![HttpResponse::new(500, "boom")],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Failed);
        assert_eq!(iam.attached(ROLE), vec![existing]);
        assert!(!iam
            .calls()
            .iter()
            .any(|call| matches!(call, IamCall::DetachRolePolicy { .. })));
    }

    #[tokio::test]
    async fn test_hashed_update_replaces_previous_parts() {
        let iam = Arc::new(InMemoryIam::new());
        for part in 1..=3 {
            let arn = iam
                .create_policy(&format!("{}-part{}", HASHED_PREFIX, part), "{}")
                .await
                .unwrap();
            iam.attach_role_policy(ROLE, &arn).await.unwrap();
        }

        let (_, envelope) = run_layout(
            PermissionsLayout::Hashed,
            RequestType::Update,
            vec![permissions_response(&permissions("s3", 10))],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Success);
        let managed = iam.managed_policies();
        assert_eq!(managed.len(), 1);
        assert!(managed[&format!("{}-part1", HASHED_PREFIX)].contains("s3:Describe00009"));
        assert_eq!(iam.attached(ROLE).len(), 1);
    }

    #[tokio::test]
    async fn test_hashed_delete_cleans_up_hashed_parts_only() {
        let iam = Arc::new(InMemoryIam::new());
        let hashed = iam
            .create_policy(&format!("{}-part1", HASHED_PREFIX), "{}")
            .await
            .unwrap();
        let split = iam
            .create_policy(&format!("{}-part1", RESOURCE_COLLECTION_PREFIX), "{}")
            .await
            .unwrap();
        iam.attach_role_policy(ROLE, &hashed).await.unwrap();
        iam.attach_role_policy(ROLE, &split).await.unwrap();

        let (transport, envelope) = run_layout(
            PermissionsLayout::Hashed,
            RequestType::Delete,
            vec![],
            iam.clone(),
            settings(),
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Success);
        assert!(envelope.data.is_empty());
        assert!(transport.requests().is_empty());
        assert_eq!(iam.attached(ROLE), vec![split]);
    }

    #[tokio::test]
    async fn test_hashed_too_many_parts_fails_before_cleanup() {
        let iam = Arc::new(InMemoryIam::new());
        let (_, envelope) = run_layout(
            PermissionsLayout::Hashed,
            RequestType::Create,
            vec![permissions_response(&permissions("ec2", 151))],
            iam.clone(),
            Settings {
                max_policies: 1,
                ..settings()
            },
        )
        .await;

        assert_eq!(envelope.status, ResponseStatus::Failed);
        assert!(envelope.reason.contains("exceed the maximum of 1"));
        assert!(iam.calls().is_empty());
    }
}
