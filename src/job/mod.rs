//! Running the archive transformations as a CodePipeline job step.

pub mod context;
pub mod event;
pub mod reporter;
pub mod runner;

use std::fmt;

pub use context::{ArtifactRef, JobContext};
pub use event::{ArtifactCredentials, JobEvent};
pub use reporter::{CodePipelineReporter, FailureKind, FailureReport, StatusReporter};
pub use runner::{JobOutcome, JobRunner, Stage};

/// Which transformation a runner performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobMode {
    /// One input artifact; `UserParameters` lists the entries to keep.
    #[default]
    Extract,
    /// Two input artifacts; the second is grafted into the first under the
    /// prefix given in `UserParameters`.
    Merge,
}

impl JobMode {
    /// Number of input artifacts the job must carry.
    pub fn input_count(self) -> usize {
        match self {
            JobMode::Extract => 1,
            JobMode::Merge => 2,
        }
    }

    pub(crate) fn verb(self) -> &'static str {
        match self {
            JobMode::Extract => "Extract",
            JobMode::Merge => "Merge",
        }
    }

    pub(crate) fn user_parameters_hint(self) -> &'static str {
        match self {
            JobMode::Extract => "UserParameters must be a comma separated list of file names",
            JobMode::Merge => "UserParameters must be the path prefix to insert the second artifact under",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Extract => f.write_str("extract"),
            JobMode::Merge => f.write_str("merge"),
        }
    }
}
