use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{ArtifactStore, S3Client, StoreConnector};
use crate::config::ClientConfig;
use crate::job::ArtifactCredentials;

/// Creates S3 clients from the job's artifact credentials.
#[derive(Debug, Clone, Default)]
pub struct S3Connector {
    config: ClientConfig,
}

impl S3Connector {
    pub fn new(config: ClientConfig) -> Self {
        S3Connector { config }
    }

    /// Build an S3 client. Without job credentials the default provider
    /// chain is used.
    pub async fn client(&self, credentials: Option<&ArtifactCredentials>) -> S3Client {
        let credentials = credentials.and_then(ArtifactCredentials::to_sdk_credentials);
        debug!(
            explicit_credentials = credentials.is_some(),
            endpoint = self.config.endpoint_url.as_deref().unwrap_or("default"),
            "Creating S3 client"
        );

        let sdk_config = self.config.load_sdk_config(credentials).await;
        S3Client::from_client(self.config.s3_client(&sdk_config))
    }
}

#[async_trait]
impl StoreConnector for S3Connector {
    async fn connect(
        &self,
        credentials: Option<&ArtifactCredentials>,
    ) -> Result<Arc<dyn ArtifactStore>> {
        let client: Arc<dyn ArtifactStore> = Arc::new(self.client(credentials).await);
        Ok(client)
    }
}
