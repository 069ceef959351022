//! Supporting execution resources and backend-facing shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::JobUid;

/// Label carrying the owning job's name.
pub const JOB_LABEL: &str = "aerjob.nav.io/job";

/// Label carrying the owning job's namespace.
pub const NAMESPACE_LABEL: &str = "aerjob.nav.io/namespace";

/// Reference from an execution resource to the job that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub namespace: String,
    pub name: String,
    pub uid: Option<JobUid>,
}

/// Desired shape of the credential binding the execution unit runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBindingSpec {
    pub namespace: String,
    pub name: String,
    pub owner: OwnerRef,
    pub labels: BTreeMap<String, String>,
}

/// Desired shape of the compute unit that runs the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnitSpec {
    pub namespace: String,
    pub name: String,
    pub image: String,
    pub identity_binding: String,
    pub owner: OwnerRef,
    pub labels: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}

/// Observed condition of an execution unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitPhase {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

/// An execution unit as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub spec: ExecutionUnitSpec,
    pub phase: UnitPhase,
}

/// Payload handed to the backend once the execution unit is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Idempotency key: submitting the same key twice yields the same job.
    pub submission_key: String,
    pub circuits_qpy: String,
    pub shots: u32,
    pub backend: String,
    pub execution_unit: String,
}

/// What the backend reports for a submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum BackendPoll {
    Pending,
    Running,
    Succeeded(serde_json::Value),
    Failed(String),
}
