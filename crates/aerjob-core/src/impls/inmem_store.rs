//! InMemoryJobStore - 開発用・テスト用の正本
//!
//! Versioned job resources with change notifications. Deleting a job
//! garbage-collects the execution resources it owns when a cluster is
//! attached, mirroring owner-reference cleanup.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use super::inmem_cluster::InMemoryExecutionClient;
use crate::domain::{AerJob, AerJobStatus, ResourceKey, StoreError};
use crate::ports::{Clock, IdGenerator, JobStore, SystemClock, UlidGenerator};

const NOTIFY_CAPACITY: usize = 1024;

struct StoreState {
    jobs: BTreeMap<ResourceKey, AerJob>,
    /// One-shot errors returned by the next `update_status` calls.
    update_faults: VecDeque<StoreError>,
    /// One-shot errors returned by the next `get` calls.
    get_faults: VecDeque<StoreError>,
}

pub struct InMemoryJobStore {
    state: Mutex<StoreState>,
    tx: broadcast::Sender<ResourceKey>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    cluster: Option<Arc<InMemoryExecutionClient>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            state: Mutex::new(StoreState {
                jobs: BTreeMap::new(),
                update_faults: VecDeque::new(),
                get_faults: VecDeque::new(),
            }),
            tx,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
            cluster: None,
        }
    }

    /// Buffer size of the change stream. Subscribers that fall further
    /// behind see `Lagged` and must resync.
    pub fn with_notify_capacity(mut self, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        self.tx = tx;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach the cluster whose owned resources are collected on delete.
    pub fn with_garbage_collection(mut self, cluster: Arc<InMemoryExecutionClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Submit a new job. Any status on the submitted object is discarded.
    pub async fn create(&self, mut job: AerJob) -> Result<AerJob, StoreError> {
        let key = job.key();
        job.metadata.uid = Some(self.ids.generate_job_uid());
        job.metadata.resource_version = 1;
        job.metadata.creation_timestamp = Some(self.clock.now());
        job.status = AerJobStatus::default();
        self.insert(key, job).await
    }

    /// Insert a job exactly as given, status included.
    ///
    /// Used to seed a job in an arbitrary lifecycle state (tests, restores).
    pub async fn restore(&self, mut job: AerJob) -> Result<AerJob, StoreError> {
        let key = job.key();
        if job.metadata.uid.is_none() {
            job.metadata.uid = Some(self.ids.generate_job_uid());
        }
        job.metadata.resource_version = job.metadata.resource_version.max(1);
        self.insert(key, job).await
    }

    async fn insert(&self, key: ResourceKey, job: AerJob) -> Result<AerJob, StoreError> {
        {
            let mut state = self.state.lock().await;
            if state.jobs.contains_key(&key) {
                return Err(StoreError::AlreadyExists(key));
            }
            state.jobs.insert(key.clone(), job.clone());
        }
        let _ = self.tx.send(key);
        Ok(job)
    }

    pub async fn delete(&self, key: &ResourceKey) -> Result<AerJob, StoreError> {
        let removed = {
            let mut state = self.state.lock().await;
            state
                .jobs
                .remove(key)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?
        };
        if let Some(cluster) = &self.cluster {
            cluster.collect_owned_by(key).await;
        }
        let _ = self.tx.send(key.clone());
        Ok(removed)
    }

    /// Make the next `update_status` fail with `err`.
    pub async fn fail_next_update(&self, err: StoreError) {
        self.state.lock().await.update_faults.push_back(err);
    }

    /// Make the next `get` fail with `err`.
    pub async fn fail_next_get(&self, err: StoreError) {
        self.state.lock().await.get_faults.push_back(err);
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<AerJob>, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.get_faults.pop_front() {
            return Err(err);
        }
        Ok(state.jobs.get(key).cloned())
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        expected_version: u64,
        status: AerJobStatus,
    ) -> Result<AerJob, StoreError> {
        let updated = {
            let mut state = self.state.lock().await;
            if let Some(err) = state.update_faults.pop_front() {
                return Err(err);
            }
            let job = state
                .jobs
                .get_mut(key)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            if job.metadata.resource_version != expected_version {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    expected: expected_version,
                    actual: job.metadata.resource_version,
                });
            }
            job.status = status;
            job.metadata.resource_version += 1;
            job.clone()
        };
        let _ = self.tx.send(key.clone());
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<AerJob>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.jobs.values().cloned().collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceKey> {
        self.tx.subscribe()
    }
}
