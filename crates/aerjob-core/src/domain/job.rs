//! The job resource: metadata, desired spec and observed status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobUid;
use super::key::{DEFAULT_NAMESPACE, ResourceKey};
use super::phase::JobPhase;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Store-managed metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,

    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<JobUid>,

    /// Bumped by the store on every write; used for optimistic concurrency.
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
            resource_version: 0,
            creation_timestamp: None,
        }
    }
}

fn default_shots() -> u32 {
    1024
}

fn default_backend() -> String {
    "ibm_torino".to_string()
}

/// Desired state, written by the submitter and never by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AerJobSpec {
    /// Base64-encoded QPY circuits to execute.
    pub circuits_qpy: String,

    #[serde(default = "default_shots")]
    pub shots: u32,

    /// Backend whose target the circuits are transpiled for.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Deadline in seconds measured from `status.startTime`. `<= 0` disables it.
    #[serde(default)]
    pub timeout: i64,

    /// Image override for the execution unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl AerJobSpec {
    pub fn new(circuits_qpy: impl Into<String>) -> Self {
        Self {
            circuits_qpy: circuits_qpy.into(),
            shots: default_shots(),
            backend: default_backend(),
            timeout: 0,
            image: None,
        }
    }

    pub fn with_timeout(mut self, secs: i64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }
}

/// Observed state, written only by the reconciliation loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AerJobStatus {
    #[serde(default)]
    pub phase: JobPhase,

    /// Set once, when the job first leaves `New`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_binding: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Irrecoverable rejection seen while creating execution resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_error: Option<String>,
}

/// A quantum execution job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AerJob {
    pub metadata: ObjectMeta,
    pub spec: AerJobSpec,
    #[serde(default)]
    pub status: AerJobStatus,
}

impl AerJob {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: AerJobSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: AerJobStatus::default(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn phase(&self) -> &JobPhase {
        &self.status.phase
    }

    /// Key used to make backend submission idempotent.
    ///
    /// The uid is unique per incarnation, so a job deleted and re-created
    /// under the same name is a fresh submission.
    pub fn submission_key(&self) -> String {
        match self.metadata.uid {
            Some(uid) => uid.to_string(),
            None => self.key().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_without_status_starts_new() {
        let json = r#"
        {
          "metadata": { "name": "bell" },
          "spec": { "circuitsQpy": "UVBZ", "timeout": 60 }
        }"#;
        let job: AerJob = serde_json::from_str(json).expect("deserialize");
        assert_eq!(job.metadata.namespace, "default");
        assert_eq!(job.status.phase, JobPhase::New);
        assert_eq!(job.spec.shots, 1024);
        assert_eq!(job.spec.backend, "ibm_torino");
        assert!(job.status.start_time.is_none());
    }

    #[test]
    fn empty_phase_string_is_new() {
        let status: AerJobStatus = serde_json::from_str(r#"{ "phase": "" }"#).unwrap();
        assert_eq!(status.phase, JobPhase::New);
    }

    #[test]
    fn status_fields_are_camel_case() {
        let status = AerJobStatus {
            phase: JobPhase::Progress,
            backend_job_id: Some("sim-1".to_string()),
            ..Default::default()
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["phase"], "Progress");
        assert_eq!(v["backendJobId"], "sim-1");
        assert!(v.get("startTime").is_none());
    }
}
