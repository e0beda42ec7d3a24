//! [`ArtifactStore`] backed by an S3-compatible bucket.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use reverie_core::providers::{ArtifactStore, ProviderError};

use crate::config::StorageConfig;

/// Errors from the object storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },

    #[error("could not presign '{key}': {message}")]
    Presign { key: String, message: String },
}

impl From<StorageError> for ProviderError {
    fn from(err: StorageError) -> Self {
        ProviderError::Request(err.to_string())
    }
}

/// Uploads finished artifacts and hands back a client-fetchable URL.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    config: StorageConfig,
}

impl S3ArtifactStore {
    /// Build a client from `config`, falling back to the default AWS
    /// credential chain when no static keys are configured.
    pub async fn from_config(config: StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "reverie-env",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Artifact storage configured"
        );
        Self { client, config }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;
        tracing::debug!(key, size, content_type, "Uploaded artifact");

        match &self.config.public_base_url {
            Some(base) => Ok(public_url(base, key)),
            None => self.presigned_url(key).await,
        }
    }

    async fn presigned_url(&self, key: &str) -> Result<String, StorageError> {
        let presign_err = |message: String| StorageError::Presign {
            key: key.to_string(),
            message,
        };
        let presigning = PresigningConfig::expires_in(Duration::from_secs(self.config.presign_secs))
            .map_err(|e| presign_err(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| presign_err(DisplayErrorContext(e).to_string()))?;
        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError> {
        Ok(self.put(key, bytes, content_type).await?)
    }
}

/// `<base>/<key>` with exactly one slash between them.
pub fn public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
