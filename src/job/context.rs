use std::fmt;

use super::JobMode;
use super::event::{Artifact, ArtifactCredentials, Job};
use crate::error::{Error, Result};

/// The only artifact location type this action understands.
pub const S3_LOCATION_TYPE: &str = "S3";

/// A validated artifact location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub name: String,
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (s3://{}/{})", self.name, self.bucket, self.key)
    }
}

/// Everything one invocation needs, checked up front.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub user_parameters: String,
    pub inputs: Vec<ArtifactRef>,
    pub output: ArtifactRef,
    pub credentials: Option<ArtifactCredentials>,
}

impl JobContext {
    /// Check the job's configuration and artifacts for `mode`.
    ///
    /// Checks run in a fixed order (payload shape, user parameters, input
    /// artifacts, output artifact, credentials) and the first failure is
    /// returned.
    pub fn from_job(job_id: &str, job: &Job, mode: JobMode) -> Result<Self> {
        if let Some(reason) = &job.malformed {
            return Err(Error::invalid(format!("malformed job payload: {reason}")));
        }

        let data = &job.data;

        let user_parameters = match data.user_parameters() {
            Some(params) if !params.is_empty() => params.to_string(),
            _ => return Err(Error::invalid(mode.user_parameters_hint())),
        };

        let inputs = data.input_artifacts.as_deref().unwrap_or_default();
        if inputs.len() != mode.input_count() {
            return Err(Error::invalid(format!(
                "expected inputArtifacts to have {} entr{}, found {}",
                mode.input_count(),
                if mode.input_count() == 1 { "y" } else { "ies" },
                inputs.len()
            )));
        }
        let inputs = inputs
            .iter()
            .enumerate()
            .map(|(i, artifact)| artifact_ref(artifact, &format!("inputArtifacts[{i}]")))
            .collect::<Result<Vec<_>>>()?;

        let outputs = data.output_artifacts.as_deref().unwrap_or_default();
        if outputs.len() != 1 {
            return Err(Error::invalid(format!(
                "expected outputArtifacts to have 1 entry, found {}",
                outputs.len()
            )));
        }
        let output = artifact_ref(&outputs[0], "outputArtifacts[0]")?;

        if let Some(credentials) = &data.artifact_credentials {
            if !credentials.is_complete() {
                return Err(Error::invalid(
                    "artifactCredentials must include accessKeyId and secretAccessKey",
                ));
            }
        }

        Ok(JobContext {
            job_id: job_id.to_string(),
            user_parameters,
            inputs,
            output,
            credentials: data.artifact_credentials.clone(),
        })
    }
}

fn artifact_ref(artifact: &Artifact, field: &str) -> Result<ArtifactRef> {
    let location = artifact
        .location
        .as_ref()
        .filter(|location| location.kind.as_deref() == Some(S3_LOCATION_TYPE))
        .ok_or_else(|| {
            Error::invalid(format!("expected {field}.location.type to be \"{S3_LOCATION_TYPE}\""))
        })?;

    let s3 = location.s3_location.as_ref();
    let bucket = s3
        .and_then(|s3| s3.bucket_name.as_deref())
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| Error::invalid(format!("{field}.location.s3Location.bucketName is missing")))?;
    let key = s3
        .and_then(|s3| s3.object_key.as_deref())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::invalid(format!("{field}.location.s3Location.objectKey is missing")))?;

    Ok(ArtifactRef {
        name: artifact.name.clone().unwrap_or_else(|| field.to_string()),
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobEvent;
    use serde_json::json;

    fn artifact(name: &str, kind: &str, key: &str) -> serde_json::Value {
        json!({
            "name": name,
            "location": {
                "type": kind,
                "s3Location": { "bucketName": "artifacts", "objectKey": key }
            }
        })
    }

    fn job(params: Option<&str>, inputs: serde_json::Value, outputs: serde_json::Value) -> Job {
        let mut configuration = json!({ "FunctionName": "zipstage" });
        if let Some(params) = params {
            configuration["UserParameters"] = json!(params);
        }
        let event = json!({
            "CodePipeline.job": {
                "id": "job-1",
                "data": {
                    "actionConfiguration": { "configuration": configuration },
                    "inputArtifacts": inputs,
                    "outputArtifacts": outputs
                }
            }
        });
        JobEvent::from_json(&event.to_string()).unwrap().job.unwrap()
    }

    fn message(result: Result<JobContext>) -> String {
        match result {
            Err(Error::InputValidation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_extract_job() {
        let job = job(
            Some("a.txt"),
            json!([artifact("App", "S3", "in.zip")]),
            json!([artifact("Out", "S3", "out.zip")]),
        );
        let context = JobContext::from_job("job-1", &job, JobMode::Extract).unwrap();

        assert_eq!(context.job_id, "job-1");
        assert_eq!(context.user_parameters, "a.txt");
        assert_eq!(context.inputs[0].key, "in.zip");
        assert_eq!(context.output.to_string(), "Out (s3://artifacts/out.zip)");
    }

    #[test]
    fn test_missing_user_parameters() {
        let job = job(None, json!([artifact("App", "S3", "in.zip")]), json!([]));
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.contains("UserParameters"));
    }

    #[test]
    fn test_empty_user_parameters() {
        let job = job(Some(""), json!([]), json!([]));
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.contains("UserParameters"));
    }

    #[test]
    fn test_wrong_input_count() {
        let job = job(Some("a.txt"), json!([]), json!([artifact("Out", "S3", "out.zip")]));
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert_eq!(message, "expected inputArtifacts to have 1 entry, found 0");
    }

    #[test]
    fn test_merge_needs_two_inputs() {
        let job = job(
            Some("secure/"),
            json!([artifact("App", "S3", "in.zip")]),
            json!([artifact("Out", "S3", "out.zip")]),
        );
        let message = message(JobContext::from_job("job-1", &job, JobMode::Merge));
        assert_eq!(message, "expected inputArtifacts to have 2 entries, found 1");
    }

    #[test]
    fn test_input_must_be_s3() {
        let job = job(
            Some("a.txt"),
            json!([artifact("App", "CodeCommit", "in.zip")]),
            json!([artifact("Out", "S3", "out.zip")]),
        );
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert_eq!(message, "expected inputArtifacts[0].location.type to be \"S3\"");
    }

    #[test]
    fn test_output_must_be_s3() {
        let job = job(
            Some("a.txt"),
            json!([artifact("App", "S3", "in.zip")]),
            json!([artifact("Out", "GitHub", "out.zip")]),
        );
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.contains("outputArtifacts[0]"));
    }

    #[test]
    fn test_missing_object_key() {
        let job = job(
            Some("a.txt"),
            json!([artifact("App", "S3", "")]),
            json!([artifact("Out", "S3", "out.zip")]),
        );
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.contains("objectKey"));
    }

    #[test]
    fn test_malformed_payload_is_rejected_first() {
        let job = Job {
            id: Some("job-1".to_string()),
            malformed: Some("invalid type: integer `5`, expected a string".to_string()),
            ..Job::default()
        };
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.starts_with("malformed job payload: invalid type"));
    }

    #[test]
    fn test_incomplete_credentials() {
        let mut job = job(
            Some("a.txt"),
            json!([artifact("App", "S3", "in.zip")]),
            json!([artifact("Out", "S3", "out.zip")]),
        );
        job.data.artifact_credentials = Some(ArtifactCredentials {
            access_key_id: Some("AKID".to_string()),
            ..ArtifactCredentials::default()
        });
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.contains("secretAccessKey"));
    }

    #[test]
    fn test_parameters_checked_before_artifacts() {
        let job = job(None, json!([]), json!([]));
        let message = message(JobContext::from_job("job-1", &job, JobMode::Extract));
        assert!(message.contains("UserParameters"));
    }
}
