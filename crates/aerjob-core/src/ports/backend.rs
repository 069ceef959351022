//! QuantumBackend port - remote execution backend
//!
//! The polling protocol is deliberately narrow; anything that can accept a
//! payload, hand back an id and later report on it can sit behind this trait.

use async_trait::async_trait;

use crate::domain::{BackendError, BackendPoll, SubmitRequest};

#[async_trait]
pub trait QuantumBackend: Send + Sync {
    /// Submit a payload. Re-submitting the same `submission_key` must return
    /// the id of the job created the first time.
    async fn submit(&self, request: &SubmitRequest) -> Result<String, BackendError>;

    async fn poll(&self, backend_job_id: &str) -> Result<BackendPoll, BackendError>;

    /// Best-effort cancellation. Cancelling a finished or unknown job is not an error.
    async fn cancel(&self, backend_job_id: &str) -> Result<(), BackendError>;
}
