//! Custom resources, one per Lambda function

pub mod account_integration;
pub mod account_validation;
pub mod agentless_scanning;
pub mod cost_management;
pub mod credential_retrieval;
pub mod integration_permissions;
pub mod integration_stack;
pub mod legacy_integration;
pub mod security_audit;
pub mod type_configuration;

pub use account_integration::AccountIntegration;
pub use account_validation::AccountValidation;
pub use agentless_scanning::AgentlessScanning;
pub use cost_management::CostManagement;
pub use credential_retrieval::CredentialRetrieval;
pub use integration_permissions::{IntegrationPermissions, PermissionsLayout};
pub use integration_stack::IntegrationStack;
pub use legacy_integration::LegacyIntegration;
pub use security_audit::SecurityAudit;
pub use type_configuration::TypeConfiguration;

use crate::datadog::Credentials;
use crate::errors::Result;
use crate::models::ResourceProperties;

/// `APIKey` / `APPKey` from the template
pub(crate) fn credentials(properties: &ResourceProperties) -> Result<Credentials> {
    Ok(Credentials {
        api_key: properties.required_str("APIKey")?.to_string(),
        app_key: properties.required_str("APPKey")?.to_string(),
    })
}
