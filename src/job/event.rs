//! The CodePipeline job event delivered to an invoke action.
//!
//! Every field is optional at this level so that a missing value is
//! reported as a job failure by validation instead of failing to parse.
//! Payloads that do not fit the schema at all still yield their job id when
//! it can be found.

use aws_sdk_s3::config::Credentials;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

const JOB_FIELD: &str = "CodePipeline.job";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "CodePipeline.job")]
    pub job: Option<Job>,
}

impl JobEvent {
    /// Parse an event payload.
    ///
    /// When the JSON does not match the job schema but still names a job id,
    /// the returned job carries only that id and the decode error in
    /// [`Job::malformed`], so the failure can be reported against the job.
    pub fn from_json(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| Error::invalid(format!("event is not valid JSON: {e}")))?;

        let err = match JobEvent::deserialize(&value) {
            Ok(event) => return Ok(event),
            Err(err) => err,
        };

        let id = value
            .get(JOB_FIELD)
            .and_then(|job| job.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::invalid(format!("event is not a CodePipeline job payload: {err}"))
            })?;

        Ok(JobEvent {
            job: Some(Job {
                id: Some(id.to_string()),
                malformed: Some(err.to_string()),
                ..Job::default()
            }),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Option<String>,
    pub account_id: Option<String>,
    #[serde(default)]
    pub data: JobData,
    /// Why the payload could not be decoded, when only the id was recovered.
    #[serde(skip)]
    pub malformed: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    pub action_configuration: Option<ActionConfiguration>,
    pub input_artifacts: Option<Vec<Artifact>>,
    pub output_artifacts: Option<Vec<Artifact>>,
    pub artifact_credentials: Option<ArtifactCredentials>,
    pub continuation_token: Option<String>,
}

impl JobData {
    /// The action's `UserParameters` string, if configured.
    pub fn user_parameters(&self) -> Option<&str> {
        self.action_configuration
            .as_ref()?
            .configuration
            .as_ref()?
            .user_parameters
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionConfiguration {
    pub configuration: Option<Configuration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    pub function_name: Option<String>,
    pub user_parameters: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artifact {
    pub name: Option<String>,
    pub revision: Option<String>,
    pub location: Option<ArtifactLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub s3_location: Option<S3Location>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Location {
    pub bucket_name: Option<String>,
    pub object_key: Option<String>,
}

/// Short-lived credentials scoped to the job's artifacts.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl ArtifactCredentials {
    /// Whether both halves of the key pair are present.
    pub fn is_complete(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.access_key_id) && present(&self.secret_access_key)
    }

    /// SDK credentials, or `None` when the key pair is incomplete.
    pub fn to_sdk_credentials(&self) -> Option<Credentials> {
        if !self.is_complete() {
            return None;
        }
        Some(Credentials::new(
            self.access_key_id.clone()?,
            self.secret_access_key.clone()?,
            self.session_token.clone(),
            None,
            "codepipeline-artifact-credentials",
        ))
    }
}

impl std::fmt::Debug for ArtifactCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}
