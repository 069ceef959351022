//! Test harness: a context wired to in-memory ports and a frozen clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::context::Context;
use crate::config::ControllerConfig;
use crate::domain::{AerJob, AerJobSpec, AerJobStatus, JobPhase, ResourceKey};
use crate::impls::{InMemoryExecutionClient, InMemoryJobStore, RecordingEventSink, SimulatedBackend};
use crate::ports::{FixedClock, JobStore, UlidGenerator};

pub(crate) const NAMESPACE: &str = "quantum";

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub(crate) struct Harness {
    pub store: Arc<InMemoryJobStore>,
    pub cluster: Arc<InMemoryExecutionClient>,
    pub backend: Arc<SimulatedBackend>,
    pub events: Arc<RecordingEventSink>,
    pub clock: Arc<FixedClock>,
    pub ctx: Arc<Context>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(InMemoryExecutionClient::new(), SimulatedBackend::new(0), ControllerConfig::default())
    }

    pub fn with(
        cluster: InMemoryExecutionClient,
        backend: SimulatedBackend,
        config: ControllerConfig,
    ) -> Self {
        Self::with_store(InMemoryJobStore::new(), cluster, backend, config)
    }

    pub fn with_store(
        store: InMemoryJobStore,
        cluster: InMemoryExecutionClient,
        backend: SimulatedBackend,
        config: ControllerConfig,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let cluster = Arc::new(cluster);
        let store = Arc::new(
            store
                .with_clock(clock.clone())
                .with_garbage_collection(cluster.clone()),
        );
        let backend = Arc::new(backend);
        let events = Arc::new(RecordingEventSink::new());
        let ctx = Context::new(
            store.clone(),
            cluster.clone(),
            backend.clone(),
            events.clone(),
            config,
        )
        .with_clock(clock.clone())
        .with_ids(Arc::new(UlidGenerator::new(clock.clone())));
        Self {
            store,
            cluster,
            backend,
            events,
            clock,
            ctx: Arc::new(ctx),
        }
    }

    /// Submit a fresh job in phase `New`.
    pub async fn submit(&self, name: &str, spec: AerJobSpec) -> AerJob {
        self.store
            .create(AerJob::new(NAMESPACE, name, spec))
            .await
            .unwrap()
    }

    /// Seed a job already in `phase`, started `started_secs_ago` seconds before now.
    pub async fn seed(
        &self,
        name: &str,
        spec: AerJobSpec,
        phase: JobPhase,
        started_secs_ago: i64,
    ) -> AerJob {
        let mut job = AerJob::new(NAMESPACE, name, spec);
        job.status = AerJobStatus {
            phase,
            start_time: Some(self.clock_now() - Duration::seconds(started_secs_ago)),
            execution_unit: Some(self.ctx.execution_unit_name(&job)),
            identity_binding: Some(self.ctx.identity_binding_name(&job)),
            ..Default::default()
        };
        self.store.restore(job).await.unwrap()
    }

    pub async fn fetch(&self, name: &str) -> AerJob {
        self.store
            .get(&ResourceKey::new(NAMESPACE, name))
            .await
            .unwrap()
            .expect("job exists")
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use crate::ports::Clock;
        self.clock.now()
    }
}
