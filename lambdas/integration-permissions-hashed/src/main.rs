//! Datadog Integration Permissions Lambda (hash-named policies)
//!
//! Serves stacks deployed from the older templates, whose managed policies
//! are chunked by count and named after a hash of the role and account.

use aws_config::BehaviorVersion;
use datadog_cfn_core::iam::IamClient;
use datadog_cfn_core::resources::IntegrationPermissions;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let settings = Settings::from_env();
    info!(max_policies = settings.max_policies, "Loaded settings");

    // Initialize AWS clients
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let iam = Arc::new(IamClient::new(aws_sdk_iam::Client::new(&config)));

    let transport = default_transport()?;
    let resource = Arc::new(IntegrationPermissions::hashed(transport.clone(), iam, &settings));

    serve(resource, transport, settings).await
}
