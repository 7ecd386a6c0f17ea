//! Job submission and status handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use reelwork_core::{
    job::JobFilter,
    pipeline::{CompositeRequest, ConcatRequest, MergeAudioRequest, SubtitleRequest, TrimRequest},
    DispatchError, Job, JobKind, JobStatus, PipelineRequest,
};

use super::middleware::AuthClient;
use crate::state::AppState;

/// Maximum allowed limit for job listings
const MAX_LIMIT: i64 = 1000;

/// Default limit for job listings
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Artifact of a completed job
#[derive(Debug, Serialize)]
pub struct JobResult {
    pub url: String,
}

/// Response for job status queries
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            result: job.result.map(|url| JobResult { url }),
            error: job.error,
        }
    }
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Trim one video
pub async fn submit_trim(
    State(state): State<Arc<AppState>>,
    AuthClient(client): AuthClient,
    payload: Result<Json<TrimRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    submit(&state, &client, PipelineRequest::Trim(body))
}

/// Trim (optionally) and concatenate several videos
pub async fn submit_concat(
    State(state): State<Arc<AppState>>,
    AuthClient(client): AuthClient,
    payload: Result<Json<ConcatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    submit(&state, &client, PipelineRequest::TrimConcat(body))
}

/// Lay an audio track over a video
pub async fn submit_merge_audio(
    State(state): State<Arc<AppState>>,
    AuthClient(client): AuthClient,
    payload: Result<Json<MergeAudioRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    submit(&state, &client, PipelineRequest::MergeAudio(body))
}

/// Burn subtitles into a video
pub async fn submit_subtitles(
    State(state): State<Arc<AppState>>,
    AuthClient(client): AuthClient,
    payload: Result<Json<SubtitleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    submit(&state, &client, PipelineRequest::SubtitleBurn(body))
}

/// Run the composite pipeline
pub async fn submit_composite(
    State(state): State<Arc<AppState>>,
    AuthClient(client): AuthClient,
    payload: Result<Json<CompositeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    submit(&state, &client, PipelineRequest::Composite(body))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    match state.store().get(&job_id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", job_id),
        )),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to read job");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// List jobs with optional filters, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);
    if let Some(status) = params.status.as_deref() {
        let status = status
            .parse::<JobStatus>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }
    if let Some(kind) = params.kind.as_deref() {
        let kind = kind
            .parse::<JobKind>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_kind(kind);
    }

    let store = state.store();
    let jobs = store
        .list(&filter)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let total = store
        .count(&filter)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

fn submit(
    state: &AppState,
    client: &str,
    request: PipelineRequest,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let kind = request.kind();
    match state.dispatcher().submit(request) {
        Ok(job_id) => {
            info!(job_id = %job_id, kind = %kind, client = %client, "Accepted job");
            Ok((
                StatusCode::ACCEPTED,
                Json(SubmitResponse {
                    job_id,
                    status: JobStatus::Queued,
                }),
            ))
        }
        Err(e) => {
            let status = match &e {
                DispatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                DispatchError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
                DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(api_error(status, e.to_string()))
        }
    }
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_job_response_shape() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let job = Job {
            id: "abc".to_string(),
            kind: JobKind::MergeAudio,
            status: JobStatus::Completed,
            created_at: at,
            updated_at: at,
            result: Some("https://cdn/merged_abc.mp4".to_string()),
            error: None,
        };

        let value = serde_json::to_value(JobResponse::from(job)).unwrap();
        assert_eq!(value["job_id"], "abc");
        assert_eq!(value["type"], "merge_audio");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["result"]["url"], "https://cdn/merged_abc.mp4");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failed_job_has_no_result() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let job = Job {
            id: "abc".to_string(),
            kind: JobKind::Trim,
            status: JobStatus::Failed,
            created_at: at,
            updated_at: at,
            result: None,
            error: Some("Upload is not configured".to_string()),
        };

        let value = serde_json::to_value(JobResponse::from(job)).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"], "Upload is not configured");
    }
}
