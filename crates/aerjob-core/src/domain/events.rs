//! Domain events recorded against a job.
//!
//! Transient failures never reach `status`; they are only visible here and in
//! logs, next to the absence of progress.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::key::ResourceKey;
use super::phase::JobPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "PascalCase")]
pub enum EventReason {
    /// Status moved along the lifecycle.
    PhaseChanged { from: JobPhase, to: JobPhase },

    /// A supporting execution resource was created.
    ResourceCreated { kind: String, name: String },

    /// A supporting execution resource was deleted during cleanup.
    ResourceDeleted { kind: String, name: String },

    /// The job exceeded `spec.timeout`.
    TimedOut { elapsed_secs: i64, limit_secs: i64 },

    /// A pass failed transiently and was handed back for retry.
    ReconcileFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub key: ResourceKey,
    #[serde(flatten)]
    pub reason: EventReason,
    pub at: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(key: ResourceKey, reason: EventReason, at: DateTime<Utc>) -> Self {
        Self { key, reason, at }
    }
}
