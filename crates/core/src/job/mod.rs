//! Durable job records: identity, lifecycle status, and terminal outcome.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{truncate_diagnostic, Job, JobKind, JobStatus, MAX_ERROR_CHARS};
