//! AWS Secrets Manager resolver

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use ledgerflow_core::collab::SecretResolver;
use ledgerflow_core::error::CollaboratorError;
use secrecy::SecretString;

/// [`SecretResolver`] reading `SecretString` values from Secrets Manager
#[derive(Debug, Clone)]
pub struct SecretsManagerResolver {
    client: Client,
}

impl SecretsManagerResolver {
    /// Build from a loaded SDK configuration
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretResolver for SecretsManagerResolver {
    async fn resolve(&self, secret_id: &str) -> Result<SecretString, CollaboratorError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|err| {
                let message = format!("{}: {}", secret_id, DisplayErrorContext(&err));
                match err.as_service_error() {
                    Some(e) if e.is_resource_not_found_exception() => {
                        CollaboratorError::NotFound(message)
                    }
                    _ => CollaboratorError::Service(message),
                }
            })?;

        output
            .secret_string()
            .map(|s| SecretString::from(s.to_string()))
            .ok_or_else(|| {
                CollaboratorError::InvalidPayload(format!("{} has no string value", secret_id))
            })
    }
}
