//! Amazon S3 object store

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use ledgerflow_core::collab::ObjectStore;
use ledgerflow_core::error::CollaboratorError;
use tracing::debug;

/// [`ObjectStore`] backed by S3 or an S3-compatible service
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Build from a loaded SDK configuration
    ///
    /// Path-style addressing is forced when a custom endpoint is set.
    pub fn new(sdk: &SdkConfig) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk);
        if sdk.endpoint_url().is_some() {
            builder = builder.force_path_style(true);
        }
        Self {
            client: S3Client::from_conf(builder.build()),
        }
    }

    /// Wrap an existing client
    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CollaboratorError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let message = format!("s3://{}/{}: {}", bucket, key, DisplayErrorContext(&err));
                match err.as_service_error() {
                    Some(e) if e.is_no_such_key() => CollaboratorError::NotFound(message),
                    _ => CollaboratorError::Service(message),
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| CollaboratorError::Service(format!("s3://{}/{}: {}", bucket, key, e)))?
            .into_bytes()
            .to_vec();

        debug!(bucket = %bucket, key = %key, bytes = body.len(), "Fetched object");
        Ok(body)
    }
}
