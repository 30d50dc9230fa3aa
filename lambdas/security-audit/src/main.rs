//! Datadog SecurityAudit Policy Lambda

use aws_config::BehaviorVersion;
use datadog_cfn_core::iam::IamClient;
use datadog_cfn_core::resources::SecurityAudit;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let iam = Arc::new(IamClient::new(aws_sdk_iam::Client::new(&config)));
    let resource = Arc::new(SecurityAudit::new(iam));

    serve(resource, default_transport()?, Settings::from_env()).await
}
