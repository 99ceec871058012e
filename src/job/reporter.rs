use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_codepipeline::Client;
use aws_sdk_codepipeline::types::{ExecutionDetails, FailureDetails, FailureType};
use tracing::info;

use crate::config::ClientConfig;

/// CodePipeline rejects failure messages longer than this.
pub const MAX_FAILURE_MESSAGE_LEN: usize = 5000;

/// The failure details handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub message: String,
    pub error_type: FailureKind,
    /// Identifies this invocation in the orchestrator's console.
    pub execution_id: String,
}

/// The failure categories the orchestrator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    JobFailed,
    ConfigurationError,
}

impl FailureReport {
    /// Build a report, truncating the message to the orchestrator's limit on
    /// a character boundary.
    pub fn new(message: &str, error_type: FailureKind, execution_id: &str) -> Self {
        let message = match message.char_indices().nth(MAX_FAILURE_MESSAGE_LEN) {
            Some((end, _)) => message[..end].to_string(),
            None => message.to_string(),
        };
        FailureReport {
            message,
            error_type,
            execution_id: execution_id.to_string(),
        }
    }
}

/// Receives the single outcome of each job invocation.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report_success(&self, job_id: &str, message: &str) -> Result<()>;

    async fn report_failure(&self, job_id: &str, failure: &FailureReport) -> Result<()>;
}

/// Reports job outcomes through the CodePipeline API.
#[derive(Debug, Clone)]
pub struct CodePipelineReporter {
    client: Client,
}

impl CodePipelineReporter {
    /// Create a reporter using the ambient credentials of the process.
    pub async fn new(config: &ClientConfig) -> Self {
        let sdk_config = config.load_sdk_config(None).await;
        CodePipelineReporter {
            client: config.codepipeline_client(&sdk_config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        CodePipelineReporter { client }
    }
}

#[async_trait]
impl StatusReporter for CodePipelineReporter {
    async fn report_success(&self, job_id: &str, message: &str) -> Result<()> {
        self.client
            .put_job_success_result()
            .job_id(job_id)
            .execution_details(ExecutionDetails::builder().summary(message).build())
            .send()
            .await
            .context(format!("Failed to put job success result for {}", job_id))?;

        info!(job_id, "putJobSuccessResult called successfully");
        Ok(())
    }

    async fn report_failure(&self, job_id: &str, failure: &FailureReport) -> Result<()> {
        let error_type = match failure.error_type {
            FailureKind::JobFailed => FailureType::JobFailed,
            FailureKind::ConfigurationError => FailureType::ConfigurationError,
        };

        let details = FailureDetails::builder()
            .r#type(error_type)
            .message(&failure.message)
            .external_execution_id(&failure.execution_id)
            .build()
            .context("Failed to build failure details")?;

        self.client
            .put_job_failure_result()
            .job_id(job_id)
            .failure_details(details)
            .send()
            .await
            .context(format!("Failed to put job failure result for {}", job_id))?;

        info!(job_id, "putJobFailureResult called successfully");
        Ok(())
    }
}
