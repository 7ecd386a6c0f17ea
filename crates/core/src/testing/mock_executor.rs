//! Mock pipeline executor for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::pipeline::{PipelineError, PipelineExecutor, PipelineRequest};
use crate::runner::RunnerError;

/// What every execution of a [`MockExecutor`] does.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return `<prefix>/<job_id>.mp4`.
    Succeed(String),
    /// Return an ffmpeg failure carrying this diagnostic.
    Fail(String),
    /// Return an empty reference.
    Empty,
    /// Panic inside the pipeline.
    Panic,
}

/// Mock implementation of the PipelineExecutor trait.
///
/// Tracks executed job ids and the peak number of concurrent executions.
/// A gate (see [`MockExecutor::gated`]) holds every execution until the
/// test adds permits.
#[derive(Debug)]
pub struct MockExecutor {
    outcome: MockOutcome,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    executed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockExecutor {
    pub fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            gate: None,
            executed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(MockOutcome::Succeed("https://mock.test".to_string()))
    }

    pub fn failing(diagnostic: &str) -> Self {
        Self::new(MockOutcome::Fail(diagnostic.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block executions until permits are added to the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Job ids whose execution started, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Highest number of executions observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PipelineExecutor for MockExecutor {
    async fn execute(
        &self,
        job_id: &str,
        _request: &PipelineRequest,
    ) -> Result<String, PipelineError> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(job_id.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(gate) = &self.gate {
            // A closed gate releases everything.
            let _permit = gate.acquire().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            MockOutcome::Succeed(prefix) => Ok(format!("{}/{}.mp4", prefix, job_id)),
            MockOutcome::Fail(diagnostic) => Err(RunnerError::Failed {
                code: Some(1),
                tail: diagnostic.clone(),
            }
            .into()),
            MockOutcome::Empty => Ok(String::new()),
            MockOutcome::Panic => panic!("mock pipeline panicked for {}", job_id),
        }
    }
}
