//! SimulatedBackend - 開発用の量子バックエンド
//!
//! Accepts any non-empty payload, reports `Running` for a configurable number
//! of polls and then succeeds with synthetic Bell-state counts. Individual
//! submissions can be scripted to fail or to stay running. Calls can be
//! slowed down to mimic a remote service.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::domain::{BackendError, BackendPoll, SubmitRequest};
use crate::ports::QuantumBackend;

/// Scripted fate of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SimOutcome {
    Succeed,
    Fail(String),
    /// Never finishes; only cancellation or a timeout ends it.
    Hang,
}

#[derive(Debug, Clone)]
struct SimJob {
    request: SubmitRequest,
    polls: u32,
    outcome: SimOutcome,
    cancelled: bool,
}

#[derive(Default)]
struct BackendState {
    /// submission_key -> backend job id
    by_submission: HashMap<String, String>,
    jobs: HashMap<String, SimJob>,
    scripts: HashMap<String, SimOutcome>,
    submit_faults: VecDeque<BackendError>,
    poll_faults: VecDeque<BackendError>,
    next_id: u64,
}

pub struct SimulatedBackend {
    state: Mutex<BackendState>,
    running_polls: u32,
    latency: Duration,
}

impl SimulatedBackend {
    /// `running_polls`: how many polls report `Running` before the outcome.
    pub fn new(running_polls: u32) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            running_polls,
            latency: Duration::ZERO,
        }
    }

    /// Delay every submit and poll by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Script the outcome of the submission with this key.
    pub async fn script(&self, submission_key: impl Into<String>, outcome: SimOutcome) {
        self.state
            .lock()
            .await
            .scripts
            .insert(submission_key.into(), outcome);
    }

    pub async fn fail_next_submit(&self, err: BackendError) {
        self.state.lock().await.submit_faults.push_back(err);
    }

    pub async fn fail_next_poll(&self, err: BackendError) {
        self.state.lock().await.poll_faults.push_back(err);
    }

    /// Number of distinct backend jobs created.
    pub async fn submitted(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn was_cancelled(&self, backend_job_id: &str) -> bool {
        self.state
            .lock()
            .await
            .jobs
            .get(backend_job_id)
            .is_some_and(|job| job.cancelled)
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(1)
    }
}

fn bell_counts(shots: u32) -> serde_json::Value {
    let half = shots / 2;
    json!({ "counts": { "00": half, "11": shots - half }, "shots": shots })
}

#[async_trait]
impl QuantumBackend for SimulatedBackend {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, BackendError> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        if let Some(err) = state.submit_faults.pop_front() {
            return Err(err);
        }
        if let Some(id) = state.by_submission.get(&request.submission_key) {
            return Ok(id.clone());
        }
        if request.circuits_qpy.is_empty() {
            return Err(BackendError::Rejected("empty circuit payload".into()));
        }
        if request.shots == 0 {
            return Err(BackendError::Rejected("shots must be positive".into()));
        }

        state.next_id += 1;
        let id = format!("sim-{:06}", state.next_id);
        let outcome = state
            .scripts
            .get(&request.submission_key)
            .cloned()
            .unwrap_or(SimOutcome::Succeed);
        state
            .by_submission
            .insert(request.submission_key.clone(), id.clone());
        state.jobs.insert(
            id.clone(),
            SimJob {
                request: request.clone(),
                polls: 0,
                outcome,
                cancelled: false,
            },
        );
        Ok(id)
    }

    async fn poll(&self, backend_job_id: &str) -> Result<BackendPoll, BackendError> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        if let Some(err) = state.poll_faults.pop_front() {
            return Err(err);
        }
        let job = state
            .jobs
            .get_mut(backend_job_id)
            .ok_or_else(|| BackendError::UnknownJob(backend_job_id.to_string()))?;
        if job.cancelled {
            return Ok(BackendPoll::Failed("cancelled".into()));
        }
        job.polls += 1;
        if job.polls <= self.running_polls {
            return Ok(BackendPoll::Running);
        }
        Ok(match &job.outcome {
            SimOutcome::Succeed => BackendPoll::Succeeded(bell_counts(job.request.shots)),
            SimOutcome::Fail(reason) => BackendPoll::Failed(reason.clone()),
            SimOutcome::Hang => BackendPoll::Running,
        })
    }

    async fn cancel(&self, backend_job_id: &str) -> Result<(), BackendError> {
        if let Some(job) = self.state.lock().await.jobs.get_mut(backend_job_id) {
            job.cancelled = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> SubmitRequest {
        SubmitRequest {
            submission_key: key.into(),
            circuits_qpy: "UVBZ".into(),
            shots: 1001,
            backend: "ibm_torino".into(),
            execution_unit: "aerjob-bell".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_submission() {
        let backend = SimulatedBackend::new(0).with_latency(Duration::from_secs(3));
        let start = tokio::time::Instant::now();
        backend.submit(&request("uid-1")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn resubmission_returns_the_same_job() {
        let backend = SimulatedBackend::new(0);
        let first = backend.submit(&request("uid-1")).await.unwrap();
        let second = backend.submit(&request("uid-1")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.submitted().await, 1);
    }

    #[tokio::test]
    async fn runs_then_succeeds_with_counts() {
        let backend = SimulatedBackend::new(2);
        let id = backend.submit(&request("uid-1")).await.unwrap();
        assert_eq!(backend.poll(&id).await.unwrap(), BackendPoll::Running);
        assert_eq!(backend.poll(&id).await.unwrap(), BackendPoll::Running);

        let BackendPoll::Succeeded(result) = backend.poll(&id).await.unwrap() else {
            panic!("expected success");
        };
        assert_eq!(result["counts"]["00"], 500);
        assert_eq!(result["counts"]["11"], 501);
    }

    #[tokio::test]
    async fn rejects_empty_payload() {
        let backend = SimulatedBackend::new(0);
        let mut empty = request("uid-1");
        empty.circuits_qpy.clear();
        let err = backend.submit(&empty).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn scripted_failure_and_cancel() {
        let backend = SimulatedBackend::new(0);
        backend.script("uid-1", SimOutcome::Fail("qubit decohered".into())).await;
        backend.script("uid-2", SimOutcome::Hang).await;

        let failing = backend.submit(&request("uid-1")).await.unwrap();
        assert_eq!(
            backend.poll(&failing).await.unwrap(),
            BackendPoll::Failed("qubit decohered".into())
        );

        let hanging = backend.submit(&request("uid-2")).await.unwrap();
        assert_eq!(backend.poll(&hanging).await.unwrap(), BackendPoll::Running);
        backend.cancel(&hanging).await.unwrap();
        assert!(backend.was_cancelled(&hanging).await);
        assert!(backend.cancel("sim-unknown").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let backend = SimulatedBackend::new(0);
        let err = backend.poll("sim-404").await.unwrap_err();
        assert_eq!(err, BackendError::UnknownJob("sim-404".into()));
    }
}
