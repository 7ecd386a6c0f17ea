//! Testing utilities and mock implementations.
//!
//! This module provides mocks for the two seams of the job service, so
//! pipelines and the dispatcher can be exercised without ffmpeg or network
//! access.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelwork_core::testing::{MockExecutor, MockRunner};
//!
//! let runner = MockRunner::new();          // records ffmpeg arguments
//! let executor = MockExecutor::succeeding(); // skips pipelines entirely
//! ```

mod mock_executor;
mod mock_runner;

pub use mock_executor::{MockExecutor, MockOutcome};
pub use mock_runner::{MockRunner, RecordedInvocation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use crate::job::{Job, JobStore};
    use crate::pipeline::{ConcatRequest, PipelineRequest, TrimRequest};

    /// Poll `store` until job `id` is terminal. Gives up after `timeout`.
    pub async fn wait_for_terminal(
        store: &dyn JobStore,
        id: &str,
        timeout: Duration,
    ) -> Option<Job> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(Some(job)) = store.get(id) {
                if job.is_terminal() {
                    return Some(job);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// A trim request for `url` with default timings.
    pub fn trim_request(url: &str) -> PipelineRequest {
        PipelineRequest::Trim(TrimRequest {
            video_url: url.to_string(),
            duration: 5.0,
            start: 0.0,
        })
    }

    /// A two-input concat request with 5 s trims.
    pub fn concat_request(first: &str, second: &str) -> PipelineRequest {
        PipelineRequest::TrimConcat(ConcatRequest {
            video_urls: vec![first.to_string(), second.to_string()],
            trim_duration: Some(5.0),
        })
    }
}
