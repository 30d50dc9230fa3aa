//! Datadog Credential Retrieval Lambda
//!
//! Exposes API/app keys and site as NoEcho attributes, optionally read from
//! Secrets Manager.

use aws_config::BehaviorVersion;
use datadog_cfn_core::resources::CredentialRetrieval;
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
    let secrets = Arc::new(SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&config)));
    let resource = Arc::new(CredentialRetrieval::new(secrets));

    serve(resource, default_transport()?, Settings::from_env()).await
}
