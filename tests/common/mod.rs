#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use zipstage::job::{ArtifactCredentials, FailureReport, JobEvent, StatusReporter};
use zipstage::s3::{ArtifactStore, StoreConnector};

pub const BUCKET: &str = "codepipeline-artifacts";
pub const SOURCE_KEY: &str = "pipeline/App/source.zip";
pub const GRAFT_KEY: &str = "pipeline/SecureConfig/config.zip";
pub const OUTPUT_KEY: &str = "pipeline/Deploy/output.zip";
pub const JOB_ID: &str = "11111111-abcd-1111-abcd-111111abcdef";

/// One entry of a fixture archive. A path ending in `/` is a directory.
pub struct Fixture<'a> {
    pub path: &'a str,
    pub content: &'a [u8],
    pub mode: u32,
}

impl<'a> Fixture<'a> {
    pub fn file(path: &'a str, content: &'a [u8]) -> Self {
        Fixture {
            path,
            content,
            mode: 0o644,
        }
    }

    pub fn dir(path: &'a str) -> Self {
        Fixture {
            path,
            content: b"",
            mode: 0o755,
        }
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Build an archive with the `zip` crate, independently of our writer.
pub fn build_zip(entries: &[Fixture]) -> Bytes {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let modified = DateTime::from_date_and_time(2024, 5, 17, 10, 30, 0).unwrap();

    for entry in entries {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(modified)
            .unix_permissions(entry.mode);

        if entry.path.ends_with('/') {
            writer.add_directory(entry.path, options).unwrap();
        } else {
            writer.start_file(entry.path, options).unwrap();
            writer.write_all(entry.content).unwrap();
        }
    }

    Bytes::from(writer.finish().unwrap().into_inner())
}

/// The App artifact used across scenarios.
pub fn app_zip() -> Bytes {
    build_zip(&[
        Fixture::file("a.txt", b"alpha contents\n"),
        Fixture::dir("dir/"),
        Fixture::file("dir/b.txt", b"bravo contents\n"),
        Fixture::file("scripts/start.sh", b"#!/bin/sh\nexec ./app\n").mode(0o755),
    ])
}

/// The SecureConfig artifact grafted in merge scenarios.
pub fn secure_config_zip() -> Bytes {
    build_zip(&[
        Fixture::dir("conf/"),
        Fixture::file("conf/db.json", b"{\"password\":\"hunter2\"}"),
        Fixture::file("conf/app.env", b"MODE=prod\n"),
    ])
}

/// Read every file of an archive with the `zip` crate, in archive order.
pub fn read_with_zip_crate(bytes: &Bytes) -> Vec<(String, Vec<u8>, Option<u32>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.push((file.name().to_string(), content, file.unix_mode()));
    }
    entries
}

/// Build a CodePipeline job event.
pub fn job_event(user_parameters: Option<&str>, inputs: &[(&str, &str)]) -> JobEvent {
    let artifact = |name: &str, key: &str| {
        json!({
            "name": name,
            "revision": null,
            "location": {
                "type": "S3",
                "s3Location": { "bucketName": BUCKET, "objectKey": key }
            }
        })
    };

    let mut configuration = json!({ "FunctionName": "zipstage" });
    if let Some(params) = user_parameters {
        configuration["UserParameters"] = json!(params);
    }

    let payload = json!({
        "CodePipeline.job": {
            "id": JOB_ID,
            "accountId": "111111111111",
            "data": {
                "actionConfiguration": { "configuration": configuration },
                "inputArtifacts": inputs
                    .iter()
                    .map(|(name, key)| artifact(name, key))
                    .collect::<Vec<_>>(),
                "outputArtifacts": [artifact("Deploy", OUTPUT_KEY)],
                "artifactCredentials": {
                    "accessKeyId": "AKIDEXAMPLE",
                    "secretAccessKey": "secret",
                    "sessionToken": "token"
                }
            }
        }
    });

    JobEvent::from_json(&payload.to_string()).unwrap()
}

/// In-memory object store that records every call.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    fetches: Mutex<Vec<String>>,
    stores: Mutex<Vec<String>>,
    fail_store: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_store() -> Self {
        MemoryStore {
            fail_store: true,
            ..Self::default()
        }
    }

    pub fn with_object(self, key: &str, body: Bytes) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((BUCKET.to_string(), key.to_string()), body);
        self
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(BUCKET.to_string(), key.to_string()))
            .cloned()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn stores(&self) -> Vec<String> {
        self.stores.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.fetches.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchKey: s3://{}/{}", bucket, key))
    }

    async fn store(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.stores.lock().unwrap().push(key.to_string());
        if self.fail_store {
            return Err(anyhow!("AccessDenied: s3://{}/{}", bucket, key));
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

/// Hands out the same [`MemoryStore`] and remembers which access key asked.
pub struct MemoryConnector {
    pub store: Arc<MemoryStore>,
    access_keys: Mutex<Vec<Option<String>>>,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        MemoryConnector {
            store: Arc::new(store),
            access_keys: Mutex::new(Vec::new()),
        }
    }

    pub fn access_keys(&self) -> Vec<Option<String>> {
        self.access_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(
        &self,
        credentials: Option<&ArtifactCredentials>,
    ) -> Result<Arc<dyn ArtifactStore>> {
        self.access_keys
            .lock()
            .unwrap()
            .push(credentials.and_then(|c| c.access_key_id.clone()));
        let store: Arc<dyn ArtifactStore> = self.store.clone();
        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Success { job_id: String, message: String },
    Failure { job_id: String, failure: FailureReport },
}

/// Status reporter that records calls, optionally rejecting all of them.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
    reject: bool,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        RecordingReporter {
            reject: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report_success(&self, job_id: &str, message: &str) -> Result<()> {
        self.reports.lock().unwrap().push(Report::Success {
            job_id: job_id.to_string(),
            message: message.to_string(),
        });
        if self.reject {
            return Err(anyhow!("ThrottlingException: rate exceeded"));
        }
        Ok(())
    }

    async fn report_failure(&self, job_id: &str, failure: &FailureReport) -> Result<()> {
        self.reports.lock().unwrap().push(Report::Failure {
            job_id: job_id.to_string(),
            failure: failure.clone(),
        });
        if self.reject {
            return Err(anyhow!("ThrottlingException: rate exceeded"));
        }
        Ok(())
    }
}
