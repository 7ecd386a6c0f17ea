//! Error types for pipeline execution.

use thiserror::Error;

use crate::runner::RunnerError;
use crate::transfer::TransferError;

/// Any failure that aborts a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Working-directory or intermediate-file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Stable tag for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transfer(TransferError::DownloadFailed { .. }) => "download_failure",
            Self::Transfer(TransferError::UploadNotConfigured) => "upload_not_configured",
            Self::Transfer(TransferError::UploadFailed { .. }) => "upload_failure",
            Self::Transfer(TransferError::ClientSetup(_)) => "io",
            Self::Runner(RunnerError::Timeout { .. }) => "process_timeout",
            Self::Runner(_) => "process_failure",
            Self::Io(_) => "io",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}
