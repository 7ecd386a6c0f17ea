//! Job admission and background scheduling.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::WorkerConfig;
use super::types::{DispatchError, PoolStats, PoolStatus};
use super::worker;
use crate::job::{JobStatus, JobStore};
use crate::metrics;
use crate::pipeline::{PipelineError, PipelineExecutor, PipelineRequest};

/// Accepts pipeline requests and runs them on a bounded worker pool.
///
/// `submit` returns as soon as the job record exists; the pipeline runs on a
/// spawned task that waits for one of `max_concurrent_jobs` permits.
pub struct Dispatcher {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    executor: Arc<dyn PipelineExecutor>,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl Dispatcher {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        executor: Arc<dyn PipelineExecutor>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            config,
            store,
            executor,
            semaphore,
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Validate, admit, record and schedule a request. Returns the job id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: PipelineRequest) -> Result<String, DispatchError> {
        self.try_submit(request).inspect_err(|e| {
            metrics::JOBS_REJECTED.with_label_values(&[e.reason()]).inc();
        })
    }

    fn try_submit(&self, request: PipelineRequest) -> Result<String, DispatchError> {
        let kind = request.kind();
        request.validate().map_err(|e| match e {
            PipelineError::InvalidInput(reason) => DispatchError::InvalidRequest(reason),
            other => DispatchError::InvalidRequest(other.to_string()),
        })?;

        let limit = self.config.admission_limit();
        let mut slot = self.stats.try_admit(limit).ok_or_else(|| {
            warn!(kind = %kind, limit, "Worker pool full, rejecting job");
            DispatchError::QueueFull { limit }
        })?;

        let job_id = Uuid::new_v4().to_string();
        // The slot is released on this path when `slot` drops.
        self.store.create(&job_id, kind).inspect_err(|e| {
            error!(kind = %kind, error = %e, "Failed to create job record");
        })?;

        metrics::JOBS_SUBMITTED.with_label_values(&[kind.as_str()]).inc();
        info!(job_id = %job_id, kind = %kind, "Job queued");

        let store = Arc::clone(&self.store);
        let executor = Arc::clone(&self.executor);
        let semaphore = Arc::clone(&self.semaphore);
        let stats = Arc::clone(&self.stats);
        let id = job_id.clone();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!(job_id = %id, "Worker pool closed before job started");
                    if let Err(e) = store.fail(&id, "worker pool shut down") {
                        error!(job_id = %id, error = %e, "Failed to record job failure");
                    }
                    stats.record_finished(false);
                    return;
                }
            };
            slot.start();
            debug!(job_id = %id, "Worker acquired");

            let status = worker::run_job(store.as_ref(), executor.as_ref(), &id, &request).await;
            stats.record_finished(status == JobStatus::Completed);
            drop(slot);
        });

        Ok(job_id)
    }

    /// Current pool occupancy.
    pub fn pool_status(&self) -> PoolStatus {
        self.stats
            .to_status(self.config.max_concurrent_jobs, self.config.max_queued_jobs)
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }
}
