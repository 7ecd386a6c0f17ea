//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, warn};

use super::store::check_update_fields;
use super::{truncate_diagnostic, Job, JobError, JobFilter, JobKind, JobStatus, JobStore};

const SELECT_COLUMNS: &str = "id, kind, status, result, error, created_at, updated_at";

/// SQLite-backed job store.
///
/// A single connection behind a mutex serializes all statements; each call
/// holds the lock for one short transaction only.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and its tables.
    ///
    /// The database runs in WAL mode with `synchronous = FULL`, so a write
    /// that returned is on disk even if the process dies right after.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL; PRAGMA busy_timeout = 5000;",
        )?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_updated_at ON jobs(updated_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("job store connection lock poisoned".to_string()))
    }

    /// Timestamps are stored with microsecond precision in a fixed-width
    /// format so that string comparison orders them chronologically.
    fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    fn format_ts(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(kind) = filter.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
        where
            E: Into<Box<dyn std::error::Error + Send + Sync>>,
        {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
        }

        let parse_ts = |idx: usize| -> rusqlite::Result<DateTime<Utc>> {
            let raw: String = row.get(idx)?;
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| conversion(idx, e))
        };

        let kind: String = row.get(1)?;
        let status: String = row.get(2)?;

        Ok(Job {
            id: row.get(0)?,
            kind: kind.parse().map_err(|e: String| conversion(1, e))?,
            status: status.parse().map_err(|e: String| conversion(2, e))?,
            result: row.get(3)?,
            error: row.get(4)?,
            created_at: parse_ts(5)?,
            updated_at: parse_ts(6)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Job>, JobError> {
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, id: &str, kind: JobKind) -> Result<Job, JobError> {
        let conn = self.lock()?;
        let now = Self::now();
        let now_str = Self::format_ts(&now);

        let inserted = conn.execute(
            "INSERT INTO jobs (id, kind, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![id, kind.as_str(), JobStatus::Queued.as_str(), now_str, now_str],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(JobError::Duplicate(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(job_id = %id, kind = %kind, "Job record created");

        Ok(Job {
            id: id.to_string(),
            kind,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn update(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<Job, JobError> {
        check_update_fields(status, result, error)?;
        let error = error.map(truncate_diagnostic);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = Self::fetch(&tx, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if current.status.is_terminal() {
            let identical = current.status == status
                && current.result.as_deref() == result
                && current.error == error;
            if identical {
                debug!(job_id = %id, status = %status, "Repeated terminal write ignored");
                return Ok(current);
            }
            warn!(
                job_id = %id,
                current = %current.status,
                attempted = %status,
                "Rejected conflicting write to terminal job"
            );
            return Err(JobError::AlreadyTerminal {
                job_id: id.to_string(),
                status: current.status,
            });
        }

        if !current.status.can_transition_to(status) {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status,
                to: status,
            });
        }

        // Never let updated_at go backwards, even if the wall clock does.
        let now = Self::now().max(current.updated_at);

        let changed = tx.execute(
            "UPDATE jobs SET status = ?, result = ?, error = ?, updated_at = ? \
             WHERE id = ? AND status NOT IN ('completed', 'failed')",
            params![status.as_str(), result, error, Self::format_ts(&now), id],
        )?;

        if changed == 0 {
            // Another connection finalized the job between our read and write.
            let latest = Self::fetch(&tx, id)?.map(|j| j.status).unwrap_or(status);
            return Err(JobError::AlreadyTerminal {
                job_id: id.to_string(),
                status: latest,
            });
        }

        tx.commit()?;

        Ok(Job {
            status,
            result: result.map(str::to_string),
            error,
            updated_at: now,
            ..current
        })
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let jobs = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn recover_interrupted(&self, reason: &str) -> Result<usize, JobError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE jobs SET status = 'failed', result = NULL, error = ?, updated_at = ? \
             WHERE status IN ('queued', 'processing')",
            params![truncate_diagnostic(reason), Self::format_ts(&Self::now())],
        )?;
        Ok(affected)
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND updated_at < ?",
            params![Self::format_ts(&cutoff.trunc_subsecs(6))],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    #[test]
    fn test_create_job() {
        let store = create_test_store();
        let job = store.create("job-1", JobKind::TrimConcat).unwrap();

        assert_eq!(job.id, "job-1");
        assert_eq!(job.kind, JobKind::TrimConcat);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.created_at, job.updated_at);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_get_job_round_trips() {
        let store = create_test_store();
        let created = store.create("job-1", JobKind::MergeAudio).unwrap();
        let fetched = store.get("job-1").unwrap().unwrap();
        assert_eq!(created, fetched);
    }

    #[test]
    fn test_get_nonexistent_job() {
        let store = create_test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = create_test_store();
        store.create("job-1", JobKind::Trim).unwrap();
        let result = store.create("job-1", JobKind::Trim);
        assert_eq!(result, Err(JobError::Duplicate("job-1".to_string())));
    }

    #[test]
    fn test_full_lifecycle() {
        let store = create_test_store();
        let created = store.create("job-1", JobKind::Composite).unwrap();

        let processing = store.mark_processing("job-1").unwrap();
        assert_eq!(processing.status, JobStatus::Processing);
        assert!(processing.updated_at >= created.updated_at);

        let completed = store.complete("job-1", "https://cdn/out.mp4").unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.result.as_deref(), Some("https://cdn/out.mp4"));
        assert!(completed.updated_at >= processing.updated_at);

        let fetched = store.get("job-1").unwrap().unwrap();
        assert_eq!(fetched, completed);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[test]
    fn test_update_unknown_job() {
        let store = create_test_store();
        let result = store.mark_processing("missing");
        assert_eq!(result, Err(JobError::NotFound("missing".to_string())));
    }

    #[test]
    fn test_conflicting_terminal_write_rejected() {
        let store = create_test_store();
        store.create("job-1", JobKind::Trim).unwrap();
        store.mark_processing("job-1").unwrap();
        store.complete("job-1", "ref-a").unwrap();

        let err = store.fail("job-1", "late failure").unwrap_err();
        assert!(matches!(
            err,
            JobError::AlreadyTerminal {
                status: JobStatus::Completed,
                ..
            }
        ));

        let err = store.complete("job-1", "ref-b").unwrap_err();
        assert!(matches!(err, JobError::AlreadyTerminal { .. }));

        let fetched = store.get("job-1").unwrap().unwrap();
        assert_eq!(fetched.result.as_deref(), Some("ref-a"));
        assert!(fetched.error.is_none());
    }

    #[test]
    fn test_identical_terminal_write_is_idempotent() {
        let store = create_test_store();
        store.create("job-1", JobKind::Trim).unwrap();
        let failed = store.fail("job-1", "boom").unwrap();

        let again = store.fail("job-1", "boom").unwrap();
        assert_eq!(again, failed);
    }

    #[test]
    fn test_processing_after_terminal_rejected() {
        let store = create_test_store();
        store.create("job-1", JobKind::Trim).unwrap();
        store.fail("job-1", "boom").unwrap();

        let err = store.mark_processing("job-1").unwrap_err();
        assert!(matches!(err, JobError::AlreadyTerminal { .. }));
    }

    #[test]
    fn test_backward_transition_rejected() {
        let store = create_test_store();
        store.create("job-1", JobKind::Trim).unwrap();
        store.mark_processing("job-1").unwrap();

        let err = store
            .update("job-1", JobStatus::Queued, None, None)
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
    }

    #[test]
    fn test_failure_diagnostic_is_truncated() {
        let store = create_test_store();
        store.create("job-1", JobKind::Trim).unwrap();
        let long = "x".repeat(10_000);
        let failed = store.fail("job-1", &long).unwrap();
        let error = failed.error.unwrap();
        assert!(error.len() <= crate::job::MAX_ERROR_CHARS);

        let fetched = store.get("job-1").unwrap().unwrap();
        assert_eq!(fetched.error.as_deref(), Some(error.as_str()));
    }

    #[test]
    fn test_list_and_count_with_filters() {
        let store = create_test_store();
        store.create("a", JobKind::Trim).unwrap();
        store.create("b", JobKind::TrimConcat).unwrap();
        store.create("c", JobKind::TrimConcat).unwrap();
        store.fail("c", "boom").unwrap();

        assert_eq!(store.count(&JobFilter::new()).unwrap(), 3);
        assert_eq!(
            store
                .count(&JobFilter::new().with_status(JobStatus::Queued))
                .unwrap(),
            2
        );
        let concat = store
            .list(&JobFilter::new().with_kind(JobKind::TrimConcat))
            .unwrap();
        assert_eq!(concat.len(), 2);

        let page = store.list(&JobFilter::new().with_limit(2)).unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn test_recover_interrupted() {
        let store = create_test_store();
        store.create("queued", JobKind::Trim).unwrap();
        store.create("running", JobKind::Trim).unwrap();
        store.mark_processing("running").unwrap();
        store.create("done", JobKind::Trim).unwrap();
        store.complete("done", "ref").unwrap();

        let recovered = store.recover_interrupted("interrupted").unwrap();
        assert_eq!(recovered, 2);

        for id in ["queued", "running"] {
            let job = store.get(id).unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.error.as_deref(), Some("interrupted"));
        }
        let done = store.get("done").unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[test]
    fn test_purge_finished_before() {
        let store = create_test_store();
        store.create("old", JobKind::Trim).unwrap();
        store.complete("old", "ref").unwrap();
        store.create("pending", JobKind::Trim).unwrap();

        let removed = store
            .purge_finished_before(Utc::now() + Duration::seconds(1))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("old").unwrap().is_none());
        assert!(store.get("pending").unwrap().is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");

        {
            let store = SqliteJobStore::new(&path).unwrap();
            store.create("job-1", JobKind::MergeAudio).unwrap();
            store.mark_processing("job-1").unwrap();
            store.complete("job-1", "ref").unwrap();
        }

        let reopened = SqliteJobStore::new(&path).unwrap();
        let job = reopened.get("job-1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("ref"));
    }
}
