//! Datadog Agentless Scanning Lambda
//!
//! Enables agentless scanning for the account on Create and removes it on Delete.

use datadog_cfn_core::resources::AgentlessScanning;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    let transport = default_transport()?;
    let resource = Arc::new(AgentlessScanning::new(transport.clone()));

    serve(resource, transport, Settings::from_env()).await
}
