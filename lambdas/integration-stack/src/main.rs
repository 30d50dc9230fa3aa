//! Datadog Integration Stack Lambda
//!
//! Creates the stack that registers the account through the Datadog registry
//! extension and returns the external id it stored.

use aws_config::BehaviorVersion;
use datadog_cfn_core::resources::IntegrationStack;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::stacks::SdkRegionalClients;
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    // Clients are rebuilt per request for the region the template names
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let resource = Arc::new(IntegrationStack::new(Arc::new(SdkRegionalClients::new(config))));

    serve(resource, default_transport()?, Settings::from_env()).await
}
