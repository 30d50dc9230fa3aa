//! Datadog Type Configuration Lambda
//!
//! Writes Datadog credentials into the configuration of a registered
//! CloudFormation extension.

use aws_config::BehaviorVersion;
use datadog_cfn_core::registry::CloudFormationRegistry;
use datadog_cfn_core::resources::TypeConfiguration;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::secrets::SecretsManagerStore;
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    // Initialize AWS clients
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let registry = Arc::new(CloudFormationRegistry::new(aws_sdk_cloudformation::Client::new(&config)));
    let secrets = Arc::new(SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&config)));
    let resource = Arc::new(TypeConfiguration::new(registry, secrets));

    serve(resource, default_transport()?, Settings::from_env()).await
}
