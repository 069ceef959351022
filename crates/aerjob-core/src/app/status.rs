//! Status - ステータスクエリ
//!
//! Point-in-time view of how many jobs sit in each phase, plus the queue.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{JobPhase, StoreError};
use crate::ports::JobStore;
use crate::queue::{QueueCounts, WorkQueue};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounts {
    pub new: usize,
    pub pending: usize,
    pub progress: usize,
    pub completed: usize,
    pub failed: usize,
    /// Phases written by a newer schema, by raw value.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown: BTreeMap<String, usize>,
}

impl PhaseCounts {
    pub fn total(&self) -> usize {
        self.new
            + self.pending
            + self.progress
            + self.completed
            + self.failed
            + self.unknown.values().sum::<usize>()
    }

    pub fn unsettled(&self) -> usize {
        self.new + self.pending + self.progress
    }

    fn record(&mut self, phase: &JobPhase) {
        match phase {
            JobPhase::New => self.new += 1,
            JobPhase::Pending => self.pending += 1,
            JobPhase::Progress => self.progress += 1,
            JobPhase::Completed => self.completed += 1,
            JobPhase::Failed => self.failed += 1,
            JobPhase::Unknown(raw) => *self.unknown.entry(raw.clone()).or_default() += 1,
        }
    }
}

pub async fn phase_counts(store: &dyn JobStore) -> Result<PhaseCounts, StoreError> {
    let mut counts = PhaseCounts::default();
    for job in store.list().await? {
        counts.record(job.phase());
    }
    Ok(counts)
}

/// What the controller is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub phases: PhaseCounts,
    pub queue: QueueCounts,
}

pub async fn controller_status(
    store: &dyn JobStore,
    queue: &WorkQueue,
) -> Result<ControllerStatus, StoreError> {
    Ok(ControllerStatus {
        phases: phase_counts(store).await?,
        queue: queue.counts().await,
    })
}
