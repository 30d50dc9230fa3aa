//! Datadog Account Validation Lambda
//!
//! Fails the stack when the Datadog-side account id is not the account the
//! stack runs in.

use datadog_cfn_core::resources::AccountValidation;
use datadog_cfn_core::runtime::{default_transport, init_tracing, serve};
use datadog_cfn_core::Settings;
use lambda_runtime::Error as LambdaError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    init_tracing();

    serve(Arc::new(AccountValidation), default_transport()?, Settings::from_env()).await
}
