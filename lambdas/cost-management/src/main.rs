//! Datadog Cloud Cost Management Lambda
//!
//! Configures the CUR 2.0 data export for an already registered account.

use datadog_cfn_core::resources::CostManagement;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let transport = default_transport()?;
    let resource = Arc::new(CostManagement::new(transport.clone()));

    serve(resource, transport, Settings::from_env()).await
}
