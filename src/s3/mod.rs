pub mod client;
pub mod connector;

pub use client::S3Client;
pub use connector::S3Connector;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::job::ArtifactCredentials;

/// Object storage that holds pipeline artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Read a whole object.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Write a whole object, replacing any existing one.
    async fn store(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;
}

/// Builds a store client for one job invocation, using the job's own
/// artifact credentials when the payload carries them.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: Option<&ArtifactCredentials>,
    ) -> Result<Arc<dyn ArtifactStore>>;
}
