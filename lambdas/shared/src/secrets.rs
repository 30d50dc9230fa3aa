//! Secrets Manager access

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;

use crate::errors::{Error, Result};

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `SecretString` of the named secret
    async fn secret_string(&self, secret_id: &str) -> Result<String>;
}

pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| Error::Secret(format!("{}: {}", secret_id, DisplayErrorContext(&e))))?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| Error::Secret(format!("{} has no SecretString", secret_id)))
    }
}

/// Fetch a secret and parse it as JSON
pub async fn secret_json<T: serde::de::DeserializeOwned>(
    store: &dyn SecretStore,
    secret_id: &str,
) -> Result<T> {
    let raw = store.secret_string(secret_id).await?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Secret(format!("{} is not valid JSON for this resource: {}", secret_id, e)))
}
