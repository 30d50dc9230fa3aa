//! Datadog AWS account registration (`/api/v2/integration/aws/accounts`)
//!
//! - Create: upsert. POST when no registration exists, PATCH the one that does.
//! - Update: PATCH the single existing registration.
//! - Delete: DELETE the registration if there is one; client errors do not
//!   block stack teardown.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::datadog::{Credentials, DatadogClient, JSON_CONTENT_TYPE};
use crate::errors::{Error, Result};
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome, ResourceProperties};
use crate::transport::{HttpResponse, HttpTransport, Method};
use crate::upsert::{plan_upsert, LookupOutcome, UpsertMethod};

const CALL_SOURCE: &str = "cfn-organizations";
const ACCOUNTS_PATH: &str = "/api/v2/integration/aws/accounts";

pub struct AccountIntegration {
    transport: Arc<dyn HttpTransport>,
}

/// Template properties of one registration
struct AccountConfig {
    credentials: Credentials,
    site: String,
    account_id: String,
    role_name: String,
    partition: String,
    account_tags: Vec<String>,
    cspm: bool,
    metrics_disabled: bool,
}

impl AccountConfig {
    fn from_properties(properties: &ResourceProperties) -> Result<Self> {
        Ok(Self {
            credentials: super::credentials(properties)?,
            site: properties.required_str("ApiURL")?.to_string(),
            account_id: properties.required_str("AccountId")?.to_string(),
            role_name: properties.required_str("RoleName")?.to_string(),
            partition: properties.required_str("AWSPartition")?.to_string(),
            account_tags: properties.string_list("AccountTags")?,
            cspm: properties.flag("CloudSecurityPostureManagement")?,
            metrics_disabled: properties.flag("DisableMetricCollection")?,
        })
    }

    /// Lookup and DELETE only need keys, site and account
    fn identity(properties: &ResourceProperties) -> Result<(Credentials, String, String)> {
        Ok((
            super::credentials(properties)?,
            properties.required_str("ApiURL")?.to_string(),
            properties.required_str("AccountId")?.to_string(),
        ))
    }

    fn body(&self) -> Value {
        json!({
            "data": {
                "type": "account",
                "attributes": {
                    "aws_account_id": self.account_id,
                    "account_tags": self.account_tags,
                    "aws_partition": self.partition,
                    "auth_config": {"role_name": self.role_name},
                    "metrics_config": {"enabled": !self.metrics_disabled},
                    "resources_config": {
                        "cloud_security_posture_management_collection": self.cspm
                    }
                }
            }
        })
    }
}

impl AccountIntegration {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn client(&self, credentials: &Credentials, site: &str) -> DatadogClient<'_> {
        DatadogClient::for_site(self.transport.as_ref(), site)
            .authenticated(credentials)
            .call_source(CALL_SOURCE)
    }

    async fn lookup(&self, client: &DatadogClient<'_>, account_id: &str) -> Result<LookupOutcome> {
        let response = client
            .get(&format!("{}?aws_account_id={}", ACCOUNTS_PATH, account_id))
            .await?;
        LookupOutcome::from_list_response(response)
    }

    async fn write(
        &self,
        client: &DatadogClient<'_>,
        config: &AccountConfig,
        method: UpsertMethod,
        existing_id: Option<&str>,
    ) -> Result<Outcome> {
        let path = match existing_id {
            Some(id) => format!("{}/{}", ACCOUNTS_PATH, id),
            None => ACCOUNTS_PATH.to_string(),
        };
        let method = method.method();
        info!(method = %method, account_id = %config.account_id, "Writing Datadog account registration");

        let response = client
            .send_json(method, &path, &config.body(), JSON_CONTENT_TYPE)
            .await?
            .error_for_status()?;

        registration_outcome(method, &response)
    }
}

/// Success data: message, external ID for the trust policy, registration id
fn registration_outcome(method: Method, response: &HttpResponse) -> Result<Outcome> {
    let body: Value = response.json()?;
    let external_id = body
        .pointer("/data/attributes/auth_config/external_id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Internal("Datadog API response did not include an external ID".to_string()))?;

    let mut outcome = Outcome::message(format!(
        "Datadog AWS Integration {} API request was successful.",
        method
    ))
    .with("ExternalId", external_id);

    if let Some(uuid) = body.pointer("/data/id").and_then(Value::as_str) {
        outcome = outcome
            .with("AccountUUID", uuid)
            .with_physical_resource_id(uuid);
    }
    Ok(outcome)
}

#[async_trait]
impl CustomResource for AccountIntegration {
    fn name(&self) -> &'static str {
        "account-integration"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let config = AccountConfig::from_properties(&event.resource_properties)?;
        let client = self.client(&config.credentials, &config.site);

        let lookup = self.lookup(&client, &config.account_id).await?;
        if let LookupOutcome::Unavailable { status, .. } = &lookup {
            warn!(status = *status, "Account lookup failed, attempting create");
        }
        let plan = plan_upsert(lookup, &config.account_id)?;

        self.write(&client, &config, plan.method, plan.existing_id.as_deref())
            .await
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let config = AccountConfig::from_properties(&event.resource_properties)?;
        let client = self.client(&config.credentials, &config.site);

        let uuid = self
            .lookup(&client, &config.account_id)
            .await?
            .require_single(&config.account_id)?;

        self.write(&client, &config, UpsertMethod::Patch, Some(&uuid))
            .await
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let (credentials, site, account_id) = AccountConfig::identity(&event.resource_properties)?;
        let client = self.client(&credentials, &site);

        let ids = match self.lookup(&client, &account_id).await? {
            LookupOutcome::Found(ids) => ids,
            LookupOutcome::Unavailable { status, body } if (400..500).contains(&status) => {
                warn!(status, body = %body, "Account lookup rejected during delete, continuing");
                return Ok(Outcome::message(format!(
                    "Datadog account lookup returned {}; nothing deleted.",
                    status
                )));
            }
            LookupOutcome::Unavailable { status, body } => return Err(Error::Api { status, body }),
        };

        let uuid = match ids.as_slice() {
            [] => {
                info!(account_id = %account_id, "No Datadog account registered, nothing to delete");
                return Ok(Outcome::message("Datadog account not found, nothing to delete."));
            }
            [uuid] => uuid.clone(),
            _ => {
                return Err(Error::AccountNotUnique {
                    account_id,
                    count: ids.len(),
                })
            }
        };

        let response = client.delete(&format!("{}/{}", ACCOUNTS_PATH, uuid)).await?;
        if response.is_client_error() {
            warn!(status = response.status, body = %response.body, "Delete rejected, continuing");
            return Ok(Outcome::message(format!(
                "Datadog API returned {} on delete; continuing.",
                response.status
            )));
        }
        response.error_for_status()?;

        Ok(Outcome::message(
            "Datadog AWS Integration DELETE API request was successful.",
        ))
    }
}
