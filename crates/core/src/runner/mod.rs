//! Supervised execution of the external transform tool.
//!
//! Every call spawns one ffmpeg process with a wall-clock budget. Combined
//! stdout/stderr goes to a log file on disk rather than into memory; when the
//! process fails, only the last [`TAIL_BYTES`] of that log are read back and
//! returned as the diagnostic.

mod config;
mod error;
mod ffmpeg;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use ffmpeg::{FfmpegRunner, ScratchFile, TAIL_BYTES};

use async_trait::async_trait;
use std::time::Duration;

/// Runs one external command to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the tool with `args` (input/output paths included), killing it
    /// after `timeout`. `job_id` only names the log file.
    async fn run(&self, args: &[String], timeout: Duration, job_id: &str)
        -> Result<(), RunnerError>;

    /// Check that the tool can be started at all.
    async fn validate(&self) -> Result<(), RunnerError>;
}
