//! Startup recovery and periodic cleanup of the work root.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::job::{JobError, JobFilter, JobStatus, JobStore};
use crate::pipeline::WORKDIR_PREFIX;

/// Failure recorded on jobs a previous process left unfinished.
pub const INTERRUPTED_REASON: &str = "interrupted by service restart";

/// Fail every job a previous process left `queued` or `processing`.
pub fn recover_interrupted_jobs(store: &dyn JobStore) -> Result<usize, JobError> {
    let recovered = store.recover_interrupted(INTERRUPTED_REASON)?;
    if recovered > 0 {
        warn!(count = recovered, "Marked interrupted jobs as failed");
    }
    Ok(recovered)
}

/// Remove job working directories and runner logs older than `older_than`.
///
/// Only `job-*` directories directly under `root` and files under
/// `<root>/logs` are considered; anything else in the root is left alone.
/// Entries belonging to a job the store still holds as `queued` or
/// `processing` are never removed, whatever their age. If the store cannot
/// be read nothing is removed. A zero `older_than` removes every other such
/// entry. Returns the number of entries removed.
pub async fn sweep_work_root(
    root: &Path,
    older_than: Duration,
    store: &dyn JobStore,
) -> io::Result<usize> {
    let live = match live_job_ids(store) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "Skipping sweep, could not read live jobs");
            return Ok(0);
        }
    };
    let mut removed = 0;

    for entry in stale_entries(root, older_than, |name, is_dir| {
        is_dir
            && name
                .strip_prefix(WORKDIR_PREFIX)
                .is_some_and(|id| !live.contains(id))
    })
    .await?
    {
        match tokio::fs::remove_dir_all(&entry).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.display(), error = %e, "Failed to remove stale work dir"),
        }
    }

    // Runner logs are named `<job_id>-<uuid>.log`.
    let log_dir = root.join("logs");
    for entry in stale_entries(&log_dir, older_than, |name, is_dir| {
        !is_dir && !live.iter().any(|id| owned_by(name, id))
    })
    .await?
    {
        match tokio::fs::remove_file(&entry).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.display(), error = %e, "Failed to remove stale log"),
        }
    }

    if removed > 0 {
        info!(root = %root.display(), removed, "Swept work root");
    }
    Ok(removed)
}

fn live_job_ids(store: &dyn JobStore) -> Result<HashSet<String>, JobError> {
    let mut ids = HashSet::new();
    for status in [JobStatus::Queued, JobStatus::Processing] {
        let filter = JobFilter::new().with_status(status).with_limit(i64::MAX);
        ids.extend(store.list(&filter)?.into_iter().map(|job| job.id));
    }
    Ok(ids)
}

fn owned_by(file_name: &str, job_id: &str) -> bool {
    file_name
        .strip_prefix(job_id)
        .is_some_and(|rest| rest.starts_with('-'))
}

async fn stale_entries(
    dir: &Path,
    older_than: Duration,
    select: impl Fn(&str, bool) -> bool,
) -> io::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut stale = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            // Raced with a pipeline removing its own files.
            Err(_) => continue,
        };
        let name = entry.file_name();
        if !select(&name.to_string_lossy(), metadata.is_dir()) {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age >= older_than {
            stale.push(entry.path());
        }
    }
    Ok(stale)
}

/// Start the periodic janitor. Stops when `shutdown` fires.
pub fn spawn_janitor(
    storage: StorageConfig,
    store: Arc<dyn JobStore>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(storage.janitor_interval_secs);
    let stale_after = Duration::from_secs(storage.stale_after_secs);

    tokio::spawn(async move {
        info!(
            interval_secs = storage.janitor_interval_secs,
            stale_after_secs = storage.stale_after_secs,
            "Janitor started"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Janitor received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match sweep_work_root(&storage.work_dir, stale_after, store.as_ref()).await {
                        Ok(removed) => debug!(removed, "Janitor sweep finished"),
                        Err(e) => warn!("Janitor sweep failed: {}", e),
                    }
                }
            }
        }
        info!("Janitor stopped");
    })
}
