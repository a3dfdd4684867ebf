//! S3 (and S3-compatible) storage backend

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use super::{StorageBackend, StorageError};
use crate::config::S3BackendConfig;

/// Reads objects from one bucket; keys are the resolved full paths
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: S3Client,
    bucket: String,
}

impl S3Backend {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from configuration
    ///
    /// Static credentials are used when both keys are set, otherwise the
    /// default AWS provider chain applies. A custom endpoint (MinIO,
    /// LocalStack) switches to path-style addressing.
    pub async fn from_config(config: &S3BackendConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "imgproxy-config",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Self::new(S3Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn key(path: &str) -> &str {
        path.trim_start_matches('/')
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(Self::key(path))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()) == Some(true) {
                    Ok(false)
                } else {
                    Err(StorageError::Backend(format!("S3 head failed: {e}")))
                }
            }
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::key(path))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    StorageError::NotFound(path.to_string())
                } else {
                    StorageError::Backend(format!("S3 fetch failed: {e}"))
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read S3 body: {e}")))?;

        Ok(body.into_bytes())
    }
}
