//! Types for the dispatch module.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::job::JobError;

/// Why a submission was refused.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The request failed validation; nothing was stored.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The worker pool is at its admission limit; nothing was stored.
    #[error("worker pool is full ({limit} jobs admitted)")]
    QueueFull { limit: usize },

    /// The job record could not be created.
    #[error(transparent)]
    Store(#[from] JobError),
}

impl DispatchError {
    /// Label used for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::QueueFull { .. } => "queue_full",
            DispatchError::Store(_) => "store",
        }
    }
}

/// Snapshot of the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Jobs currently running a pipeline.
    pub active_jobs: usize,
    /// Maximum concurrent jobs.
    pub max_concurrent: usize,
    /// Admitted jobs waiting for a worker.
    pub queued_jobs: usize,
    /// Maximum waiting jobs.
    pub max_queued: usize,
    /// Jobs completed since startup.
    pub total_completed: u64,
    /// Jobs failed since startup.
    pub total_failed: u64,
}

/// Live counters of the worker pool.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    admitted: AtomicU64,
    active: AtomicU64,
    queued: AtomicU64,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    /// Reserve one admission slot unless `limit` slots are already taken.
    pub(crate) fn try_admit(self: &Arc<Self>, limit: usize) -> Option<Slot> {
        let limit = limit as u64;
        self.admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()?;
        self.queued.fetch_add(1, Ordering::Relaxed);
        Some(Slot {
            stats: Arc::clone(self),
            running: false,
        })
    }

    pub(crate) fn record_finished(&self, completed: bool) {
        if completed {
            self.total_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn to_status(&self, max_concurrent: usize, max_queued: usize) -> PoolStatus {
        PoolStatus {
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            max_queued,
            total_completed: self.total_completed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// An admission slot. Released when dropped.
#[derive(Debug)]
pub(crate) struct Slot {
    stats: Arc<PoolStats>,
    running: bool,
}

impl Slot {
    /// Move the slot from waiting to running.
    pub(crate) fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            self.stats.active.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.running {
            self.stats.active.fetch_sub(1, Ordering::Relaxed);
        } else {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
        }
        self.stats.admitted.fetch_sub(1, Ordering::SeqCst);
    }
}
