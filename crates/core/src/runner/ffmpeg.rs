//! FFmpeg-based process runner.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::RunnerConfig;
use super::error::RunnerError;
use super::ProcessRunner;
use crate::metrics;

/// How much of the log is returned as the failure diagnostic.
pub const TAIL_BYTES: u64 = 1024;

/// A file that is removed when the guard is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Create (truncate) the file and return the guard with an open handle.
    pub fn create(path: PathBuf) -> std::io::Result<(Self, std::fs::File)> {
        let file = std::fs::File::create(&path)?;
        Ok((Self { path }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

/// Runs ffmpeg with output captured to a per-invocation log file.
pub struct FfmpegRunner {
    config: RunnerConfig,
    log_dir: PathBuf,
}

impl FfmpegRunner {
    pub fn new(config: RunnerConfig, log_dir: PathBuf) -> Self {
        Self { config, log_dir }
    }

    /// Global flags followed by the step's own arguments.
    fn build_args(&self, args: &[String]) -> Vec<String> {
        let mut full = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ];
        full.extend(args.iter().cloned());
        full
    }

    fn spawn_error(&self, e: std::io::Error) -> RunnerError {
        if e.kind() == std::io::ErrorKind::NotFound {
            RunnerError::NotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            RunnerError::Io(e)
        }
    }
}

/// Last [`TAIL_BYTES`] of the log, lossily decoded and trimmed.
async fn read_tail(path: &Path) -> String {
    async fn read(path: &Path) -> std::io::Result<String> {
        let mut file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let start = len.saturating_sub(TAIL_BYTES);
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    }

    read(path).await.unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Failed to read ffmpeg log tail");
        String::new()
    })
}

#[async_trait]
impl ProcessRunner for FfmpegRunner {
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        job_id: &str,
    ) -> Result<(), RunnerError> {
        tokio::fs::create_dir_all(&self.log_dir).await?;

        let log_path = self
            .log_dir
            .join(format!("{}-{}.log", job_id, Uuid::new_v4()));
        let (log, stdout_file) = ScratchFile::create(log_path)?;
        let stderr_file = stdout_file.try_clone()?;

        let started = Instant::now();
        let spawned = Command::new(&self.config.ffmpeg_path)
            .args(self.build_args(args))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let err = self.spawn_error(e);
                metrics::FFMPEG_INVOCATIONS
                    .with_label_values(&[err.outcome()])
                    .inc();
                return Err(err);
            }
        };

        debug!(job_id = %job_id, pid = ?child.id(), "ffmpeg started");

        let result = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(RunnerError::Failed {
                code: status.code(),
                tail: read_tail(log.path()).await,
            }),
            Ok(Err(e)) => Err(RunnerError::Io(e)),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(job_id = %job_id, error = %e, "Failed to kill timed-out ffmpeg");
                }
                Err(RunnerError::Timeout {
                    timeout_secs: timeout.as_secs(),
                    tail: read_tail(log.path()).await,
                })
            }
        };

        let outcome = match &result {
            Ok(()) => "success",
            Err(e) => e.outcome(),
        };
        metrics::FFMPEG_INVOCATIONS
            .with_label_values(&[outcome])
            .inc();
        metrics::FFMPEG_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(()) => debug!(
                job_id = %job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "ffmpeg finished"
            ),
            Err(e) => warn!(job_id = %job_id, outcome, error = %e, "ffmpeg run failed"),
        }

        result
    }

    async fn validate(&self) -> Result<(), RunnerError> {
        let status = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(RunnerError::Failed {
                code: status.code(),
                tail: String::new(),
            })
        }
    }
}
