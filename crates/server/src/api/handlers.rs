use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::Disks;
use tracing::warn;
use reelwork_core::PoolStatus;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Upper bound on the ffmpeg probe so health checks stay fast.
const FFMPEG_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    /// "healthy" when ffmpeg and the work dir are usable, else "degraded".
    pub status: String,
    pub ffmpeg: String,
    pub work_dir: String,
    /// Free space on the work dir's filesystem; null if it cannot be found.
    pub disk_free_mb: Option<u64>,
    pub upload_configured: bool,
    pub pool: PoolStatus,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ffmpeg_ok = match tokio::time::timeout(FFMPEG_PROBE_TIMEOUT, state.runner().validate()).await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("ffmpeg probe failed: {}", e);
            false
        }
        Err(_) => {
            warn!("ffmpeg probe timed out");
            false
        }
    };

    let work_dir_ok = tokio::fs::metadata(state.work_dir())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let work_dir = state.work_dir().to_path_buf();
    let disk_free_mb = tokio::task::spawn_blocking(move || disk_free_mb(&work_dir))
        .await
        .ok()
        .flatten();

    let status = if ffmpeg_ok && work_dir_ok {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        ffmpeg: if ffmpeg_ok { "available" } else { "unavailable" }.to_string(),
        work_dir: if work_dir_ok { "ok" } else { "missing" }.to_string(),
        disk_free_mb,
        upload_configured: state.upload_configured(),
        pool: state.dispatcher().pool_status(),
    })
}

/// Available space, in MiB, on the mounted filesystem holding `path`.
fn disk_free_mb(path: &Path) -> Option<u64> {
    let path = std::fs::canonicalize(path).ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space() / (1024 * 1024))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
