//! Error types for the process runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The binary could not be spawned because it does not exist.
    #[error("ffmpeg not found at path: {path}")]
    NotFound { path: PathBuf },

    /// The process exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    #[error(
        "ffmpeg exited with {}: {tail}",
        .code.map_or_else(|| "a signal".to_string(), |c| format!("code {}", c))
    )]
    Failed { code: Option<i32>, tail: String },

    /// The process exceeded its wall-clock budget and was killed.
    #[error("ffmpeg timed out after {timeout_secs} seconds: {tail}")]
    Timeout { timeout_secs: u64, tail: String },

    /// Log file or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Diagnostic output captured from the process, if any.
    pub fn tail(&self) -> Option<&str> {
        match self {
            Self::Failed { tail, .. } | Self::Timeout { tail, .. } => Some(tail),
            _ => None,
        }
    }

    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Failed { .. } => "failed",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }
}
