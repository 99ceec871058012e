use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use super::context::{ArtifactRef, JobContext};
use super::event::{Job, JobEvent};
use super::reporter::{FailureKind, FailureReport, StatusReporter};
use super::JobMode;
use crate::error::{Error, Result};
use crate::pipeline;
use crate::s3::{ArtifactStore, StoreConnector};

/// The steps of one invocation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidatingInput,
    FetchingSource,
    Extracting,
    Merging,
    StoringResult,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ValidatingInput => "validating input",
            Stage::FetchingSource => "fetching source",
            Stage::Extracting => "extracting",
            Stage::Merging => "merging",
            Stage::StoringResult => "storing result",
        };
        f.write_str(name)
    }
}

/// How an invocation ended. Exactly one is reported per run.
#[derive(Debug)]
pub enum JobOutcome {
    Success {
        message: String,
    },
    Failure {
        stage: Stage,
        /// What the runner was doing, e.g. "Error while saving output artifact".
        message: String,
        cause: Error,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    /// The message as sent to the orchestrator.
    pub fn report_message(&self) -> String {
        match self {
            JobOutcome::Success { message } => message.clone(),
            JobOutcome::Failure { message, cause, .. } => format!("{message}: {}", cause.chain()),
        }
    }
}

/// A fatal error tagged with the stage it ended.
struct StageFailure {
    stage: Stage,
    message: String,
    cause: Error,
}

impl StageFailure {
    fn new(stage: Stage, message: impl Into<String>, cause: Error) -> Self {
        StageFailure {
            stage,
            message: message.into(),
            cause,
        }
    }
}

/// Runs one pipeline job: validate, fetch, transform, store, report.
pub struct JobRunner {
    connector: Arc<dyn StoreConnector>,
    reporter: Arc<dyn StatusReporter>,
    mode: JobMode,
    execution_id: String,
}

impl JobRunner {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        reporter: Arc<dyn StatusReporter>,
        mode: JobMode,
    ) -> Self {
        JobRunner {
            connector,
            reporter,
            mode,
            execution_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Use a specific execution id in failure reports instead of a random one.
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Run one invocation and report its outcome.
    ///
    /// Returns the reported outcome once the orchestrator has acknowledged
    /// it. An event without a job id cannot be reported at all and is
    /// returned as [`Error::InputValidation`]; a failed report call is
    /// returned as [`Error::StatusReport`].
    pub async fn run(&self, event: &JobEvent) -> Result<JobOutcome> {
        let job = event
            .job
            .as_ref()
            .ok_or_else(|| Error::invalid("event is missing \"CodePipeline.job\""))?;
        let job_id = job
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::invalid("CodePipeline job has no id"))?;

        info!(job_id, mode = %self.mode, execution_id = %self.execution_id, "Starting job");

        let outcome = match self.execute(job_id, job).await {
            Ok(message) => JobOutcome::Success { message },
            Err(failure) => {
                error!(
                    job_id,
                    stage = %failure.stage,
                    kind = failure.cause.kind(),
                    error = %failure.cause.chain(),
                    "{}",
                    failure.message
                );
                JobOutcome::Failure {
                    stage: failure.stage,
                    message: failure.message,
                    cause: failure.cause,
                }
            }
        };

        self.report(job_id, &outcome).await?;
        Ok(outcome)
    }

    async fn execute(&self, job_id: &str, job: &Job) -> Result<String, StageFailure> {
        let context = JobContext::from_job(job_id, job, self.mode).map_err(|e| {
            StageFailure::new(Stage::ValidatingInput, "Invalid job configuration", e)
        })?;
        info!(params = %context.user_parameters, output = %context.output, "Validated job input");

        let store = self
            .connector
            .connect(context.credentials.as_ref())
            .await
            .map_err(|e| {
                StageFailure::new(
                    Stage::FetchingSource,
                    "Error creating storage client",
                    Error::storage("Failed to connect to artifact store", e),
                )
            })?;

        let output = match self.mode {
            JobMode::Extract => {
                let source = fetch(store.as_ref(), &context.inputs[0]).await?;
                pipeline::extract(source, &context.user_parameters)
                    .map_err(|e| {
                        StageFailure::new(Stage::Extracting, "Error while extracting files from zip", e)
                    })?
                    .bytes
            }
            JobMode::Merge => {
                let base = fetch(store.as_ref(), &context.inputs[0]).await?;
                let graft = fetch(store.as_ref(), &context.inputs[1]).await?;
                pipeline::merge(base, graft, &context.user_parameters)
                    .map_err(|e| StageFailure::new(Stage::Merging, "Error while merging zip files", e))?
                    .bytes
            }
        };

        let target = &context.output;
        info!(artifact = %target, size = output.len(), "Writing output artifact");
        store
            .store(&target.bucket, &target.key, output)
            .await
            .map_err(|e| {
                StageFailure::new(
                    Stage::StoringResult,
                    "Error while saving output artifact to S3 bucket",
                    Error::storage(format!("Failed to store {target}"), e),
                )
            })?;

        info!("Output artifact written successfully");
        Ok(format!("{} complete", self.mode.verb()))
    }

    async fn report(&self, job_id: &str, outcome: &JobOutcome) -> Result<()> {
        let delivered = match outcome {
            JobOutcome::Success { message } => self.reporter.report_success(job_id, message).await,
            JobOutcome::Failure { cause, .. } => {
                let kind = match cause {
                    Error::InputValidation(_) => FailureKind::ConfigurationError,
                    _ => FailureKind::JobFailed,
                };
                let failure = FailureReport::new(&outcome.report_message(), kind, &self.execution_id);
                self.reporter.report_failure(job_id, &failure).await
            }
        };

        delivered.map_err(|source| Error::StatusReport {
            job_id: job_id.to_string(),
            source: source.into(),
        })
    }
}

async fn fetch(store: &dyn ArtifactStore, artifact: &ArtifactRef) -> Result<Bytes, StageFailure> {
    info!(artifact = %artifact, "Fetching input artifact");
    let bytes = store.fetch(&artifact.bucket, &artifact.key).await.map_err(|e| {
        StageFailure::new(
            Stage::FetchingSource,
            format!(
                "Error getting object {} from bucket {}. Make sure they exist and the bucket is in the same region as this function",
                artifact.key, artifact.bucket
            ),
            Error::storage(format!("Failed to fetch {artifact}"), e),
        )
    })?;
    info!(artifact = %artifact, size = bytes.len(), "Fetched input artifact");
    Ok(bytes)
}
