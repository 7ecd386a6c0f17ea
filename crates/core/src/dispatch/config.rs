//! Configuration for the worker pool.

use serde::{Deserialize, Serialize};

/// Bounds of the background worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Pipelines allowed to run at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Admitted jobs allowed to wait for a worker. Submissions beyond
    /// `max_concurrent_jobs + max_queued_jobs` are rejected.
    #[serde(default = "default_max_queued_jobs")]
    pub max_queued_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_queued_jobs: default_max_queued_jobs(),
        }
    }
}

impl WorkerConfig {
    /// Total number of jobs admitted at once (running plus waiting).
    pub fn admission_limit(&self) -> usize {
        self.max_concurrent_jobs.saturating_add(self.max_queued_jobs)
    }
}

fn default_max_concurrent_jobs() -> usize {
    1
}

fn default_max_queued_jobs() -> usize {
    32
}
