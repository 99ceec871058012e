use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::{Credentials, Region};

/// Configuration shared by the S3 and CodePipeline clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Optional custom endpoint URL (e.g. LocalStack)
    pub endpoint_url: Option<String>,
    /// Optional region override; otherwise the default provider chain decides
    pub region: Option<String>,
    /// Whether to use path-style addressing (required for some S3-compatible services)
    pub force_path_style: bool,
}

impl ClientConfig {
    /// Load the shared SDK configuration, optionally pinned to explicit
    /// credentials instead of the default provider chain.
    pub async fn load_sdk_config(&self, credentials: Option<Credentials>) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(credentials);
        }

        loader.load().await
    }

    /// Build an S3 client configured for this endpoint.
    pub fn s3_client(&self, sdk_config: &SdkConfig) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);

        if let Some(endpoint) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        if self.force_path_style {
            builder = builder.force_path_style(true);
        }

        aws_sdk_s3::Client::from_conf(builder.build())
    }

    /// Build a CodePipeline client configured for this endpoint.
    pub fn codepipeline_client(&self, sdk_config: &SdkConfig) -> aws_sdk_codepipeline::Client {
        let mut builder = aws_sdk_codepipeline::config::Builder::from(sdk_config);

        if let Some(endpoint) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        aws_sdk_codepipeline::Client::from_conf(builder.build())
    }
}
