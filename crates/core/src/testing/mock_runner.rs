//! Mock process runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::runner::{ProcessRunner, RunnerError};

/// One recorded call to [`MockRunner::run`].
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub job_id: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl RecordedInvocation {
    /// The output path (ffmpeg's last argument).
    pub fn output(&self) -> Option<&Path> {
        self.args.last().map(Path::new)
    }

    /// Which pipeline step the arguments describe.
    pub fn step_label(&self) -> String {
        let has = |flag: &str| self.args.iter().any(|a| a == flag);
        let label = if self.args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat") {
            "concat"
        } else if has("-vf") {
            "subtitles"
        } else if has("-map") {
            "merge_audio"
        } else if has("-t") {
            "trim"
        } else {
            "unknown"
        };
        label.to_string()
    }
}

/// Mock implementation of the ProcessRunner trait.
///
/// Records every invocation and, on success, writes a small placeholder file
/// at the output path so later steps and uploads find it. Failures can be
/// injected for specific calls (0-based, in invocation order).
///
/// # Example
///
/// ```rust,ignore
/// use reelwork_core::testing::MockRunner;
///
/// let runner = MockRunner::new().fail_on_call(1, RunnerError::Failed { code: Some(1), tail: "boom".into() });
/// // ... run a pipeline ...
/// assert_eq!(runner.invocations().len(), 2);
/// ```
#[derive(Debug)]
pub struct MockRunner {
    invocations: Mutex<Vec<RecordedInvocation>>,
    failures: Mutex<HashMap<usize, RunnerError>>,
    delay: Option<Duration>,
    available: bool,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            delay: None,
            available: true,
        }
    }

    /// Make call number `index` fail with `error`.
    pub fn fail_on_call(self, index: usize, error: RunnerError) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, error);
        self
    }

    /// Simulated run time of every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make `validate` report the binary as missing.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// All invocations so far, in order.
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        job_id: &str,
    ) -> Result<(), RunnerError> {
        let index = {
            let mut invocations = self.invocations.lock().unwrap_or_else(|e| e.into_inner());
            invocations.push(RecordedInvocation {
                job_id: job_id.to_string(),
                args: args.to_vec(),
                timeout,
            });
            invocations.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&index);
        if let Some(error) = failure {
            return Err(error);
        }

        if let Some(output) = args.last().map(PathBuf::from) {
            if output.parent().is_some_and(|p| p.is_dir()) {
                tokio::fs::write(&output, b"mock output").await?;
            }
        }
        Ok(())
    }

    async fn validate(&self) -> Result<(), RunnerError> {
        if self.available {
            Ok(())
        } else {
            Err(RunnerError::NotFound {
                path: PathBuf::from("ffmpeg"),
            })
        }
    }
}
