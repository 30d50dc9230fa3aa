//! Cloud Cost Management data export (CUR 2.0) for a registered account

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::datadog::{DatadogClient, JSON_CONTENT_TYPE};
use crate::errors::Result;
use crate::lifecycle::CustomResource;
use crate::models::{LifecycleEvent, Outcome};
use crate::transport::{HttpTransport, Method};
use crate::upsert::LookupOutcome;

const CALL_SOURCE: &str = "cfn-ccm-cur2";
const ACCOUNTS_PATH: &str = "/api/v2/integration/aws/accounts";
const REPORT_TYPE: &str = "CUR2.0";

pub struct CostManagement {
    transport: Arc<dyn HttpTransport>,
}

impl CostManagement {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    async fn configure(&self, event: &LifecycleEvent) -> Result<Outcome> {
        let properties = &event.resource_properties;
        let credentials = super::credentials(properties)?;
        let account_id = properties.required_str("AccountId")?;
        let client = DatadogClient::for_site(self.transport.as_ref(), properties.required_str("ApiURL")?)
            .authenticated(&credentials)
            .call_source(CALL_SOURCE);

        let lookup = client
            .get(&format!("{}?aws_account_id={}", ACCOUNTS_PATH, account_id))
            .await?;
        let uuid = LookupOutcome::from_list_response(lookup)?.require_single(account_id)?;
        info!(account_uuid = %uuid, "Found Datadog account");

        let body = json!({
            "data": {
                "type": "account",
                "attributes": {
                    "ccm_config": {
                        "data_export_configs": [{
                            "report_name": properties.required_str("ReportName")?,
                            "report_prefix": properties.required_str("ReportPrefix")?,
                            "report_type": REPORT_TYPE,
                            "bucket_name": properties.required_str("BucketName")?,
                            "bucket_region": properties.required_str("BucketRegion")?,
                        }]
                    }
                }
            }
        });

        client
            .send_json(
                Method::Post,
                &format!("{}/{}/ccm_config", ACCOUNTS_PATH, uuid),
                &body,
                JSON_CONTENT_TYPE,
            )
            .await?
            .error_for_status()?;
        info!("Configured CCM data export");

        Ok(Outcome::message("CCM data export configured successfully").with("AccountUUID", uuid))
    }
}

#[async_trait]
impl CustomResource for CostManagement {
    fn name(&self) -> &'static str {
        "cost-management"
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<Outcome> {
        self.configure(event).await
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<Outcome> {
        self.configure(event).await
    }

    /// The export config outlives the stack
    async fn delete(&self, _event: &LifecycleEvent) -> Result<Outcome> {
        Ok(Outcome::message("Delete successful"))
    }
}
