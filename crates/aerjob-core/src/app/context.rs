//! Shared reconciliation context: the ports plus configuration.

use std::sync::Arc;

use crate::config::ControllerConfig;
use crate::domain::{AerJob, EventReason, JobEvent, ResourceKey};
use crate::ports::{
    Clock, EventSink, ExecutionClient, IdGenerator, JobStore, QuantumBackend, SystemClock,
    UlidGenerator,
};

/// Everything a phase handler may touch.
///
/// Handlers receive the context by reference and never keep state of their
/// own between passes; what they need is re-read from the store each time.
pub struct Context {
    pub store: Arc<dyn JobStore>,
    pub cluster: Arc<dyn ExecutionClient>,
    pub backend: Arc<dyn QuantumBackend>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventSink>,
    pub ids: Arc<dyn IdGenerator>,
    pub config: ControllerConfig,
}

impl Context {
    pub fn new(
        store: Arc<dyn JobStore>,
        cluster: Arc<dyn ExecutionClient>,
        backend: Arc<dyn QuantumBackend>,
        events: Arc<dyn EventSink>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            cluster,
            backend,
            clock: Arc::new(SystemClock),
            events,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn emit(&self, key: ResourceKey, reason: EventReason) {
        self.events.emit(JobEvent::new(key, reason, self.clock.now()));
    }

    /// Deterministic execution-unit name for a job.
    pub fn execution_unit_name(&self, job: &AerJob) -> String {
        format!("{}-{}", self.config.name_prefix, job.metadata.name)
    }

    /// Deterministic identity-binding name for a job.
    pub fn identity_binding_name(&self, job: &AerJob) -> String {
        format!("{}-{}-runner", self.config.name_prefix, job.metadata.name)
    }
}
