//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job lifecycle (submissions, terminal outcomes)
//! - Pipeline execution (step durations, ffmpeg invocations)
//! - Transfers (downloaded bytes, uploads)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs accepted by the dispatcher, by kind.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelwork_jobs_submitted_total", "Total jobs accepted"),
        &["kind"],
    )
    .unwrap()
});

/// Submissions refused, by reason.
pub static JOBS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelwork_jobs_rejected_total",
            "Total submissions refused before a job was created",
        ),
        &["reason"], // "invalid_request", "queue_full", "store"
    )
    .unwrap()
});

/// Jobs that reached `completed`, by kind.
pub static JOBS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelwork_jobs_completed_total", "Total jobs completed"),
        &["kind"],
    )
    .unwrap()
});

/// Jobs that reached `failed`, by kind and failure tag.
pub static JOBS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelwork_jobs_failed_total", "Total jobs failed"),
        &["kind", "reason"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// End-to-end pipeline duration in seconds.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelwork_pipeline_duration_seconds",
            "Duration of pipeline runs",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["kind", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// ffmpeg invocations by outcome.
pub static FFMPEG_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelwork_ffmpeg_invocations_total", "Total ffmpeg runs"),
        &["outcome"], // "success", "failed", "timeout", "not_found"
    )
    .unwrap()
});

/// ffmpeg run duration in seconds.
pub static FFMPEG_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("reelwork_ffmpeg_duration_seconds", "Duration of ffmpeg runs")
            .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 900.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Transfer Metrics
// =============================================================================

/// Transfers by direction and result.
pub static TRANSFERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelwork_transfers_total", "Total downloads and uploads"),
        &["direction", "result"], // direction: "download", "upload"
    )
    .unwrap()
});

/// Bytes moved by direction.
pub static TRANSFER_BYTES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelwork_transfer_bytes_total", "Total bytes transferred"),
        &["direction"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOBS_FAILED.clone()),
        // Pipeline
        Box::new(PIPELINE_DURATION.clone()),
        Box::new(FFMPEG_INVOCATIONS.clone()),
        Box::new(FFMPEG_DURATION.clone()),
        // Transfers
        Box::new(TRANSFERS_TOTAL.clone()),
        Box::new(TRANSFER_BYTES.clone()),
    ]
}
