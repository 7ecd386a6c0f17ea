//! Supervised execution of a single job.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::job::{truncate_diagnostic, Job, JobError, JobStatus, JobStore};
use crate::metrics;
use crate::pipeline::{PipelineExecutor, PipelineRequest};

/// Failure recorded when a pipeline returns an empty reference.
pub const EMPTY_RESULT_ERROR: &str = "pipeline finished without producing a result";

/// Attempts made for one status write when the database reports an error.
const WRITE_ATTEMPTS: u32 = 4;

/// Delay before the first retry; doubled on each further attempt.
const WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// Run one job and write its terminal status.
///
/// Writes `processing`, runs the pipeline with panics caught, then writes
/// exactly one of `completed` or `failed`. Store writes that fail with a
/// database error are retried with backoff. If the result cannot be
/// recorded the job is failed with that diagnostic instead.
///
/// Returns `Completed` only when the completion was durably written.
pub async fn run_job(
    store: &dyn JobStore,
    executor: &dyn PipelineExecutor,
    job_id: &str,
    request: &PipelineRequest,
) -> JobStatus {
    let kind = request.kind();
    let kind_label = kind.as_str();
    let started = Instant::now();

    if let Err(e) = write_with_retry(store, job_id, JobStatus::Processing, None, None).await {
        error!(job_id = %job_id, kind = %kind, error = %e, "Failed to mark job as processing");
        let message = format!("could not start job: {}", e);
        return finish_failed(store, job_id, kind_label, "store", &message, started).await;
    }
    info!(job_id = %job_id, kind = %kind, "Job processing");

    let outcome = AssertUnwindSafe(executor.execute(job_id, request))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(reference)) if !reference.trim().is_empty() => {
            match write_with_retry(store, job_id, JobStatus::Completed, Some(&reference), None)
                .await
            {
                Ok(_) => {
                    info!(
                        job_id = %job_id,
                        kind = %kind,
                        result = %reference,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job completed"
                    );
                    metrics::JOBS_COMPLETED.with_label_values(&[kind_label]).inc();
                    metrics::PIPELINE_DURATION
                        .with_label_values(&[kind_label, "success"])
                        .observe(started.elapsed().as_secs_f64());
                    JobStatus::Completed
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to record job completion");
                    let message = format!("could not record result {}: {}", reference, e);
                    finish_failed(store, job_id, kind_label, "store", &message, started).await
                }
            }
        }
        Ok(Ok(_)) => {
            finish_failed(store, job_id, kind_label, "empty_result", EMPTY_RESULT_ERROR, started)
                .await
        }
        Ok(Err(e)) => {
            finish_failed(store, job_id, kind_label, e.kind(), &e.to_string(), started).await
        }
        Err(panic) => {
            let message = format!("pipeline panicked: {}", panic_message(panic.as_ref()));
            finish_failed(store, job_id, kind_label, "panic", &message, started).await
        }
    }
}

async fn finish_failed(
    store: &dyn JobStore,
    job_id: &str,
    kind: &str,
    reason: &str,
    message: &str,
    started: Instant,
) -> JobStatus {
    let message = truncate_diagnostic(message);
    warn!(job_id = %job_id, kind = %kind, reason = %reason, error = %message, "Job failed");

    // A job that never reached a terminal state is failed by startup recovery.
    if let Err(e) = write_with_retry(store, job_id, JobStatus::Failed, None, Some(&message)).await
    {
        error!(job_id = %job_id, error = %e, "Failed to record job failure");
    }
    metrics::JOBS_FAILED.with_label_values(&[kind, reason]).inc();
    metrics::PIPELINE_DURATION
        .with_label_values(&[kind, "failed"])
        .observe(started.elapsed().as_secs_f64());
    JobStatus::Failed
}

/// Write a status, retrying database errors with exponential backoff.
///
/// Lifecycle errors (unknown id, conflicting terminal state) are returned
/// at once. A retried write that had in fact committed is accepted by the
/// store as an identical repeat.
async fn write_with_retry(
    store: &dyn JobStore,
    job_id: &str,
    status: JobStatus,
    result: Option<&str>,
    error: Option<&str>,
) -> Result<Job, JobError> {
    let mut delay = WRITE_BACKOFF;
    let mut attempt = 1;
    loop {
        match store.update(job_id, status, result, error) {
            Err(JobError::Database(reason)) if attempt < WRITE_ATTEMPTS => {
                warn!(
                    job_id = %job_id,
                    status = %status,
                    attempt,
                    error = %reason,
                    "Job status write failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobFilter, JobKind, SqliteJobStore, MAX_ERROR_CHARS};
    use crate::testing::fixtures::trim_request;
    use crate::testing::{MockExecutor, MockOutcome};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects the next `remaining` writes of `status` as a locked database.
    struct FlakyStore {
        inner: SqliteJobStore,
        status: JobStatus,
        remaining: AtomicUsize,
    }

    impl FlakyStore {
        fn new(status: JobStatus, failures: usize) -> Self {
            Self {
                inner: SqliteJobStore::in_memory().unwrap(),
                status,
                remaining: AtomicUsize::new(failures),
            }
        }
    }

    impl JobStore for FlakyStore {
        fn create(&self, id: &str, kind: JobKind) -> Result<Job, JobError> {
            self.inner.create(id, kind)
        }

        fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
            self.inner.get(id)
        }

        fn update(
            &self,
            id: &str,
            status: JobStatus,
            result: Option<&str>,
            error: Option<&str>,
        ) -> Result<Job, JobError> {
            if status == self.status
                && self
                    .remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(JobError::Database("database is locked".to_string()));
            }
            self.inner.update(id, status, result, error)
        }

        fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
            self.inner.list(filter)
        }

        fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
            self.inner.count(filter)
        }

        fn recover_interrupted(&self, reason: &str) -> Result<usize, JobError> {
            self.inner.recover_interrupted(reason)
        }

        fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobError> {
            self.inner.purge_finished_before(cutoff)
        }
    }

    fn queued(store: &SqliteJobStore, id: &str) {
        store.create(id, JobKind::Trim).unwrap();
    }

    #[tokio::test]
    async fn test_success_completes_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        queued(&store, "j1");
        let executor = MockExecutor::succeeding();

        let status = run_job(&store, &executor, "j1", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Completed);
        let job = store.get("j1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("https://mock.test/j1.mp4"));
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_error_fails_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        queued(&store, "j2");
        let executor = MockExecutor::failing("Invalid data found when processing input");

        let status = run_job(&store, &executor, "j2", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Failed);
        let job = store.get("j2").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job
            .error
            .unwrap()
            .contains("Invalid data found when processing input"));
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn test_empty_result_fails_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        queued(&store, "j3");
        let executor = MockExecutor::new(MockOutcome::Empty);

        run_job(&store, &executor, "j3", &trim_request("https://a/v.mp4")).await;

        let job = store.get("j3").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(EMPTY_RESULT_ERROR));
    }

    #[tokio::test]
    async fn test_panic_fails_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        queued(&store, "j4");
        let executor = MockExecutor::new(MockOutcome::Panic);

        let status = run_job(&store, &executor, "j4", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Failed);
        let job = store.get("j4").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().starts_with("pipeline panicked"));
    }

    #[tokio::test]
    async fn test_long_error_is_truncated() {
        let store = SqliteJobStore::in_memory().unwrap();
        queued(&store, "j5");
        let executor = MockExecutor::failing(&"x".repeat(5000));

        run_job(&store, &executor, "j5", &trim_request("https://a/v.mp4")).await;

        let job = store.get("j5").unwrap().unwrap();
        assert!(job.error.unwrap().chars().count() <= MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn test_missing_record_skips_pipeline() {
        let store = SqliteJobStore::in_memory().unwrap();
        let executor = MockExecutor::succeeding();

        let status = run_job(&store, &executor, "ghost", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Failed);
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_completion_write_is_retried() {
        let store = FlakyStore::new(JobStatus::Completed, 1);
        store.create("j6", JobKind::Trim).unwrap();
        let executor = MockExecutor::succeeding();

        let status = run_job(&store, &executor, "j6", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Completed);
        let job = store.get("j6").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("https://mock.test/j6.mp4"));
    }

    #[tokio::test]
    async fn test_unrecordable_completion_fails_job() {
        let store = FlakyStore::new(JobStatus::Completed, usize::MAX);
        store.create("j7", JobKind::Trim).unwrap();
        let executor = MockExecutor::succeeding();

        let status = run_job(&store, &executor, "j7", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Failed);
        let job = store.get("j7").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert!(error.starts_with("could not record result https://mock.test/j7.mp4"));
        assert!(error.contains("database is locked"));
    }

    #[tokio::test]
    async fn test_failure_write_is_retried() {
        let store = FlakyStore::new(JobStatus::Failed, 2);
        store.create("j8", JobKind::Trim).unwrap();
        let executor = MockExecutor::failing("moov atom not found");

        let status = run_job(&store, &executor, "j8", &trim_request("https://a/v.mp4")).await;

        assert_eq!(status, JobStatus::Failed);
        let job = store.get("j8").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("moov atom not found"));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
