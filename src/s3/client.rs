use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use super::ArtifactStore;

/// Wrapper around AWS S3 client
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        S3Client { client }
    }

    /// Get an entire object's contents
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context(format!("Failed to get object s3://{}/{}", bucket, key))?;

        debug!(
            bucket,
            key,
            content_type = resp.content_type().unwrap_or("unknown"),
            content_length = resp.content_length().unwrap_or(0),
            "Reading object body"
        );

        let bytes = resp
            .body
            .collect()
            .await
            .context("Failed to read object body")?
            .into_bytes();

        Ok(bytes)
    }

    /// Upload an entire object
    pub async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let length = body.len();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/zip")
            .body(ByteStream::from(body))
            .send()
            .await
            .context(format!("Failed to put object s3://{}/{}", bucket, key))?;

        debug!(bucket, key, length, "Stored object");
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for S3Client {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.get_object(bucket, key).await
    }

    async fn store(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.put_object(bucket, key, body).await
    }
}
