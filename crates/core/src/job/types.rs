//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length, in characters, of a stored failure diagnostic.
pub const MAX_ERROR_CHARS: usize = 2000;

/// Lifecycle status of a job.
///
/// Transitions only move forward: `queued -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the lifecycle; terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether a job currently in `self` may be written with `next`.
    ///
    /// Rewriting the same non-terminal status is allowed (it only advances
    /// `updated_at`); terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Which pipeline a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Trim,
    TrimConcat,
    MergeAudio,
    SubtitleBurn,
    Composite,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Trim => "trim",
            JobKind::TrimConcat => "trim_concat",
            JobKind::MergeAudio => "merge_audio",
            JobKind::SubtitleBurn => "subtitle_burn",
            JobKind::Composite => "composite",
        }
    }

    pub fn all() -> [JobKind; 5] {
        [
            JobKind::Trim,
            JobKind::TrimConcat,
            JobKind::MergeAudio,
            JobKind::SubtitleBurn,
            JobKind::Composite,
        ]
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::all()
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown job kind: {}", s))
    }
}

/// The durable record of one asynchronous pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier (UUID).
    pub id: String,

    /// Requested pipeline.
    pub kind: JobKind,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    /// Advances on every status write.
    pub updated_at: DateTime<Utc>,

    /// Artifact reference; only set when `status == Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Failure diagnostic; only set when `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Truncates a diagnostic to [`MAX_ERROR_CHARS`] characters, keeping the
/// beginning and marking the cut.
pub fn truncate_diagnostic(message: &str) -> String {
    const MARKER: &str = "... [truncated]";

    if message.chars().count() <= MAX_ERROR_CHARS {
        return message.to_string();
    }

    let keep = MAX_ERROR_CHARS - MARKER.len();
    let mut out: String = message.chars().take(keep).collect();
    out.push_str(MARKER);
    out
}
