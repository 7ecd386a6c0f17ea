//! Job storage trait and types.

use chrono::{DateTime, Utc};
use std::fmt;

use super::{Job, JobKind, JobStatus};

/// Error type for job store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Job not found.
    NotFound(String),
    /// The job already reached a terminal state and the write conflicts with it.
    AlreadyTerminal { job_id: String, status: JobStatus },
    /// The write would move the job backwards in its lifecycle.
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
    /// Result/error fields do not match the requested status.
    InvalidUpdate(String),
    /// A job with this id already exists.
    Duplicate(String),
    /// The durable write or read could not complete.
    Database(String),
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::NotFound(id) => write!(f, "Job not found: {}", id),
            JobError::AlreadyTerminal { job_id, status } => {
                write!(f, "Job {} is already {}", job_id, status)
            }
            JobError::InvalidTransition { job_id, from, to } => {
                write!(f, "Cannot move job {} from {} to {}", job_id, from, to)
            }
            JobError::InvalidUpdate(msg) => write!(f, "Invalid job update: {}", msg),
            JobError::Duplicate(id) => write!(f, "Job already exists: {}", id),
            JobError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for JobError {}

impl From<rusqlite::Error> for JobError {
    fn from(e: rusqlite::Error) -> Self {
        JobError::Database(e.to_string())
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            kind: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Durable storage for job records.
///
/// Implementations must persist every write before returning and must never
/// let a terminal record be overwritten. Writing a terminal state that is
/// identical to the stored one is accepted as a no-op; any other write to a
/// terminal job fails with [`JobError::AlreadyTerminal`].
pub trait JobStore: Send + Sync {
    /// Insert a new record in the `queued` state.
    fn create(&self, id: &str, kind: JobKind) -> Result<Job, JobError>;

    /// Get a job by ID. `Ok(None)` means the id is unknown.
    fn get(&self, id: &str) -> Result<Option<Job>, JobError>;

    /// Write a status, with the result (completed) or error (failed).
    fn update(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<Job, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// Count jobs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Fail every job left `queued` or `processing` by a previous process.
    /// Returns the number of jobs affected.
    fn recover_interrupted(&self, reason: &str) -> Result<usize, JobError>;

    /// Delete terminal jobs last updated before `cutoff`.
    /// Returns the number of records removed.
    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobError>;

    fn mark_processing(&self, id: &str) -> Result<Job, JobError> {
        self.update(id, JobStatus::Processing, None, None)
    }

    fn complete(&self, id: &str, result: &str) -> Result<Job, JobError> {
        self.update(id, JobStatus::Completed, Some(result), None)
    }

    fn fail(&self, id: &str, error: &str) -> Result<Job, JobError> {
        self.update(id, JobStatus::Failed, None, Some(error))
    }
}

/// Checks that result/error presence matches the status being written.
pub(crate) fn check_update_fields(
    status: JobStatus,
    result: Option<&str>,
    error: Option<&str>,
) -> Result<(), JobError> {
    match status {
        JobStatus::Completed if result.is_none() || error.is_some() => Err(
            JobError::InvalidUpdate("completed requires a result and no error".to_string()),
        ),
        JobStatus::Failed if error.is_none() || result.is_some() => Err(JobError::InvalidUpdate(
            "failed requires an error and no result".to_string(),
        )),
        JobStatus::Queued | JobStatus::Processing if result.is_some() || error.is_some() => {
            Err(JobError::InvalidUpdate(format!(
                "{} cannot carry a result or error",
                status
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_check_update_fields() {
        assert_ok!(check_update_fields(JobStatus::Processing, None, None));
        assert_ok!(check_update_fields(JobStatus::Completed, Some("url"), None));
        assert_ok!(check_update_fields(JobStatus::Failed, None, Some("boom")));

        assert_err!(check_update_fields(JobStatus::Completed, None, None));
        assert_err!(check_update_fields(JobStatus::Completed, Some("url"), Some("boom")));
        assert_err!(check_update_fields(JobStatus::Failed, None, None));
        assert_err!(check_update_fields(JobStatus::Processing, Some("url"), None));
    }

    #[test]
    fn test_error_display() {
        let err = JobError::AlreadyTerminal {
            job_id: "abc".to_string(),
            status: JobStatus::Completed,
        };
        assert_eq!(err.to_string(), "Job abc is already completed");
        assert_eq!(
            JobError::NotFound("x".to_string()).to_string(),
            "Job not found: x"
        );
    }

    #[test]
    fn test_filter_builder() {
        let filter = JobFilter::new()
            .with_status(JobStatus::Failed)
            .with_kind(JobKind::Composite)
            .with_limit(5)
            .with_offset(10);
        assert_eq!(filter.status, Some(JobStatus::Failed));
        assert_eq!(filter.kind, Some(JobKind::Composite));
        assert_eq!(filter.limit, 5);
        assert_eq!(filter.offset, 10);
    }
}
