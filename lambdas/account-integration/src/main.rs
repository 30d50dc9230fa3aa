//! Datadog Account Integration Lambda
//!
//! Registers the AWS account with Datadog through `/api/v2/integration/aws/accounts`.

use datadog_cfn_core::resources::AccountIntegration;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let settings = Settings::from_env();
    let transport = default_transport()?;
    let resource = Arc::new(AccountIntegration::new(transport.clone()));

    serve(resource, transport, settings).await
}
