//! Datadog AWS Integration (v1 API) Lambda

use datadog_cfn_core::resources::LegacyIntegration;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let transport = default_transport()?;
    let resource = Arc::new(LegacyIntegration::new(transport.clone()));

    serve(resource, transport, Settings::from_env()).await
}
