//! HTTP API tests for job submission and status.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestConfig, TestFixture};

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["ffmpeg"], "available");
    assert_eq!(response.body["work_dir"], "ok");
    assert_eq!(response.body["upload_configured"], true);
    assert_eq!(response.body["pool"]["max_concurrent"], 2);
    assert!(response.body.get("disk_free_mb").is_some());
}

#[tokio::test]
async fn test_health_reports_missing_uploads() {
    let fixture = TestFixture::with_config(TestConfig::without_uploads());
    let response = fixture.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["upload_configured"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    let text = response.body.as_str().unwrap_or_default();
    assert!(text.contains("reelwork_http_requests_total"));
    assert!(text.contains("reelwork_pool_active"));
}

#[tokio::test]
async fn test_trim_lifecycle() {
    let fixture = TestFixture::new();

    let response = fixture
        .post(
            "/trim",
            json!({ "video_url": fixture.input("a.mp4"), "duration": 3, "start": 1 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "queued");
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    let job = fixture.wait_for_job(&job_id).await;
    assert_eq!(job["job_id"], job_id.as_str());
    assert_eq!(job["type"], "trim");
    assert_eq!(job["status"], "completed");
    assert_eq!(
        job["result"]["url"],
        format!("https://cdn.test/trimmed_{}.mp4", job_id)
    );
    assert!(job.get("error").is_none());
    assert_eq!(fixture.leftover_work_dirs(), 0);
}

#[tokio::test]
async fn test_concat_two_inputs() {
    let fixture = TestFixture::new();

    let response = fixture
        .post(
            "/concat",
            json!({
                "video_urls": [fixture.input("a.mp4"), fixture.input("b.mp4")],
                "trim_duration": 5
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    let job = fixture.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["type"], "trim_concat");

    let steps: Vec<String> = fixture
        .runner
        .invocations()
        .iter()
        .map(|c| c.step_label())
        .collect();
    assert_eq!(steps, ["trim", "trim", "concat"]);
}

#[tokio::test]
async fn test_concat_requires_two_inputs() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/concat", json!({ "video_urls": [fixture.input("a.mp4")] }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("at least 2"));
}

#[tokio::test]
async fn test_too_many_inputs_rejected() {
    let fixture = TestFixture::new();
    let urls: Vec<String> = (0..21)
        .map(|i| format!("https://example.com/{}.mp4", i))
        .collect();

    let response = fixture.post("/process", json!({ "video_urls": urls })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let fixture = TestFixture::new();

    let response = fixture.post_raw("/trim", "{not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture.post("/merge-audio", json!({ "video_url": "x" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subtitles_require_content() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/add-subtitles", json!({ "video_url": fixture.input("a.mp4") }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subtitle_entries_burned_in() {
    let fixture = TestFixture::new();

    let response = fixture
        .post(
            "/add-subtitles",
            json!({
                "video_url": fixture.input("a.mp4"),
                "subtitles": [
                    { "text": "Hello", "start": 0, "end": 2 },
                    { "text": "World", "start": 2, "end": 4, "position": "top" }
                ],
                "font_color": "yellow"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let job_id = response.body["job_id"].as_str().unwrap().to_string();
    let job = fixture.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["type"], "subtitle_burn");
}

#[tokio::test]
async fn test_composite_pipeline() {
    let fixture = TestFixture::new();

    let response = fixture
        .post(
            "/process",
            json!({
                "video_urls": [fixture.input("a.mp4"), fixture.input("b.mp4")],
                "audio_url": fixture.input("music.mp3"),
                "segments": [{ "title": "One" }, { "caption": "Two" }],
                "add_text": true
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let job_id = response.body["job_id"].as_str().unwrap().to_string();
    let job = fixture.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["type"], "composite");

    let steps: Vec<String> = fixture
        .runner
        .invocations()
        .iter()
        .map(|c| c.step_label())
        .collect();
    assert_eq!(steps, ["trim", "trim", "concat", "merge_audio", "subtitles"]);
}

#[tokio::test]
async fn test_upload_not_configured_fails_job() {
    let fixture = TestFixture::with_config(TestConfig::without_uploads());

    let response = fixture
        .post("/trim", json!({ "video_url": fixture.input("a.mp4") }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let job_id = response.body["job_id"].as_str().unwrap().to_string();
    let job = fixture.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["error"], "Upload is not configured");
    assert!(job.get("result").is_none());
    assert_eq!(fixture.leftover_work_dirs(), 0);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let fixture = TestFixture::new();

    let response = fixture.get("/tasks/does-not-exist").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("does-not-exist"));
}

#[tokio::test]
async fn test_queue_full_returns_503() {
    let fixture = TestFixture::with_config(TestConfig::gated(1, 1));
    let body = json!({ "video_url": "https://example.com/a.mp4" });

    assert_eq!(fixture.post("/trim", body.clone()).await.status, StatusCode::ACCEPTED);
    assert_eq!(fixture.post("/trim", body.clone()).await.status, StatusCode::ACCEPTED);

    let response = fixture.post("/trim", body).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    let listing = fixture.get("/tasks").await;
    assert_eq!(listing.body["total"], 2);

    fixture.release();
}

#[tokio::test]
async fn test_list_jobs_filters() {
    let fixture = TestFixture::with_config(TestConfig::gated(1, 8));

    for _ in 0..3 {
        let response = fixture
            .post("/trim", json!({ "video_url": "https://example.com/a.mp4" }))
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED);
    }

    let listing = fixture.get("/tasks?type=trim&limit=2").await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(listing.body["total"], 3);

    let listing = fixture.get("/tasks?type=composite").await;
    assert_eq!(listing.body["total"], 0);

    let listing = fixture.get("/tasks?status=bogus").await;
    assert_eq!(listing.status, StatusCode::BAD_REQUEST);

    fixture.release();
}

#[tokio::test]
async fn test_api_key_required_for_submissions() {
    let fixture = TestFixture::with_config(TestConfig::with_api_key("secret"));
    let body = json!({ "video_url": fixture.input("a.mp4") });

    let response = fixture.post("/trim", body.clone()).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = fixture.post_with_key("/trim", body.clone(), "wrong").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = fixture.post_with_key("/trim", body, "secret").await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    // Reads stay open
    let job_id = response.body["job_id"].as_str().unwrap().to_string();
    let response = fixture.get(&format!("/tasks/{}", job_id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fixture.get("/health").await.status, StatusCode::OK);
}
