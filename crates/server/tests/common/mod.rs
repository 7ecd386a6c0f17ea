//! Common test utilities for in-process HTTP testing.
//!
//! This module provides a test fixture that builds the full router with the
//! real dispatcher, job store and pipeline engine, but a mock ffmpeg runner
//! and local `file://` inputs, so no external tools or network are needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use reqwest::Url;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use reelwork_core::{
    load_config_from_str,
    testing::{MockExecutor, MockRunner},
    transfer::{ArtifactStore, FsArtifactStore, TransferConfig, UnconfiguredStore},
    ApiKeyAuthenticator, Authenticator, Dispatcher, Downloader, NoneAuthenticator,
    PipelineEngine, PipelineExecutor, RunnerConfig, SqliteJobStore, WorkerConfig,
};
use reelwork_server::{api::create_router, state::AppState};

/// Test fixture for HTTP testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_trim() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/trim", json!({
///         "video_url": fixture.input("a.mp4"),
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock ffmpeg runner used by the engine
    pub runner: Arc<MockRunner>,
    /// Holds gated jobs until permits are added (gated fixtures only)
    pub gate: Option<Arc<Semaphore>>,
    /// Temporary directory for the database, inputs, work root and uploads
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Require this API key on submissions
    pub api_key: Option<String>,
    pub workers: WorkerConfig,
    /// Publish artifacts to a local directory; otherwise uploads are disabled
    pub uploads: bool,
    /// Replace the engine with an executor that blocks until released
    pub gated: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            workers: WorkerConfig {
                max_concurrent_jobs: 2,
                max_queued_jobs: 16,
            },
            uploads: true,
            gated: false,
        }
    }
}

impl TestConfig {
    pub fn with_api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn without_uploads() -> Self {
        Self {
            uploads: false,
            ..Default::default()
        }
    }

    pub fn gated(max_concurrent_jobs: usize, max_queued_jobs: usize) -> Self {
        Self {
            workers: WorkerConfig {
                max_concurrent_jobs,
                max_queued_jobs,
            },
            gated: true,
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with defaults.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let work_dir = temp_dir.path().join("work");
        std::fs::create_dir_all(work_dir.join("logs")).expect("Failed to create work dir");

        let config = load_config_from_str(&format!(
            r#"
[auth]
method = "{method}"
api_key = "{key}"

[database]
path = "{db}"

[storage]
work_dir = "{work}"
"#,
            method = if test_config.api_key.is_some() { "api_key" } else { "none" },
            key = test_config.api_key.clone().unwrap_or_default(),
            db = temp_dir.path().join("test.db").display(),
            work = work_dir.display(),
        ))
        .expect("Failed to parse test config");

        let authenticator: Arc<dyn Authenticator> = match &test_config.api_key {
            Some(key) => Arc::new(ApiKeyAuthenticator::new(key.clone())),
            None => Arc::new(NoneAuthenticator),
        };

        let store = Arc::new(
            SqliteJobStore::new(&config.database.path).expect("Failed to create job store"),
        );
        let runner = Arc::new(MockRunner::new());

        let (executor, gate) = if test_config.gated {
            let (executor, gate) = MockExecutor::succeeding().gated();
            (Arc::new(executor) as Arc<dyn PipelineExecutor>, Some(gate))
        } else {
            let artifacts: Arc<dyn ArtifactStore> = if test_config.uploads {
                Arc::new(FsArtifactStore::with_dir(
                    temp_dir.path().join("public"),
                    Some("https://cdn.test".to_string()),
                ))
            } else {
                Arc::new(UnconfiguredStore)
            };
            let engine = PipelineEngine::new(
                runner.clone(),
                Downloader::new(&TransferConfig::default()).expect("Failed to build downloader"),
                artifacts,
                work_dir,
                RunnerConfig::default(),
            );
            (Arc::new(engine) as Arc<dyn PipelineExecutor>, None)
        };

        let dispatcher = Arc::new(Dispatcher::new(
            test_config.workers.clone(),
            store,
            executor,
        ));
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            dispatcher,
            runner.clone(),
            test_config.uploads,
        ));

        Self {
            router: create_router(state),
            runner,
            gate,
            temp_dir,
        }
    }

    /// A local input file exposed as a file:// URL.
    pub fn input(&self, name: &str) -> String {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, b"fake media bytes").expect("Failed to write input");
        Url::from_file_path(&path)
            .expect("absolute path")
            .to_string()
    }

    /// Number of job working directories left in the work root.
    pub fn leftover_work_dirs(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("work"))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with("job-"))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Let every gated job run.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    /// Poll `GET /tasks/{id}` until the job is terminal.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        for _ in 0..500 {
            let response = self.get(&format!("/tasks/{}", job_id)).await;
            let status = response.body["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), None).await
    }

    /// Send a POST request with JSON body and an `X-API-Key` header.
    pub async fn post_with_key(&self, path: &str, body: Value, key: &str) -> TestResponse {
        self.request("POST", path, Some(body), Some(key)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        api_key: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(key) = api_key {
            request_builder = request_builder.header("X-API-Key", key);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}
