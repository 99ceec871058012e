use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while transforming archives or running a pipeline job.
#[derive(Debug, Error)]
pub enum Error {
    /// The invocation payload is missing a field or has the wrong shape.
    #[error("invalid job input: {0}")]
    InputValidation(String),

    /// The source bytes are not a readable ZIP archive, or an entry failed
    /// to inflate.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// The writer could not encode its entries.
    #[error("failed to serialize archive: {0}")]
    Serialization(String),

    /// The object store rejected a fetch or a store.
    #[error("{message}")]
    Storage {
        message: String,
        #[source]
        source: BoxError,
    },

    /// The orchestrator could not be told about the outcome.
    #[error("failed to report status for job {job_id}")]
    StatusReport {
        job_id: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptArchive(message.into())
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InputValidation(message.into())
    }

    pub(crate) fn storage(message: impl Into<String>, source: anyhow::Error) -> Self {
        Error::Storage {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Short name of the error category, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InputValidation(_) => "InputValidationError",
            Error::CorruptArchive(_) => "CorruptArchive",
            Error::Serialization(_) => "SerializationError",
            Error::Storage { .. } => "StorageError",
            Error::StatusReport { .. } => "StatusReportError",
        }
    }

    /// Render this error and every source below it as `a: b: c`.
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
