//! InMemoryExecutionClient - 開発用・テスト用のクラスタ
//!
//! Holds identity bindings and execution units in maps keyed by
//! `(namespace, name)`. Units are created `Running` when `auto_ready` is set
//! and `Pending` otherwise; tests drive them with `set_unit_phase`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use crate::domain::{
    ClusterError, ExecutionUnit, ExecutionUnitSpec, IdentityBindingSpec, JOB_LABEL,
    NAMESPACE_LABEL, ResourceKey, UnitPhase,
};
use crate::ports::ExecutionClient;

const NOTIFY_CAPACITY: usize = 1024;

const BINDING_KIND: &str = "IdentityBinding";
const UNIT_KIND: &str = "ExecutionUnit";

/// Operations a one-shot fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterOp {
    CreateIdentityBinding,
    CreateExecutionUnit,
    GetExecutionUnit,
    DeleteExecutionUnit,
    DeleteIdentityBinding,
}

type ObjectKey = (String, String);

#[derive(Default)]
struct ClusterState {
    bindings: BTreeMap<ObjectKey, IdentityBindingSpec>,
    units: BTreeMap<ObjectKey, ExecutionUnit>,
    faults: HashMap<ClusterOp, ClusterError>,
    creates: usize,
    deletes: usize,
}

impl ClusterState {
    fn take_fault(&mut self, op: ClusterOp) -> Result<(), ClusterError> {
        match self.faults.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct InMemoryExecutionClient {
    state: Mutex<ClusterState>,
    tx: broadcast::Sender<ResourceKey>,
    auto_ready: bool,
}

fn owner_key(labels: &BTreeMap<String, String>) -> Option<ResourceKey> {
    let namespace = labels.get(NAMESPACE_LABEL)?;
    let name = labels.get(JOB_LABEL)?;
    Some(ResourceKey::new(namespace, name))
}

impl InMemoryExecutionClient {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            state: Mutex::new(ClusterState::default()),
            tx,
            auto_ready: true,
        }
    }

    /// Units start `Pending` and stay there until `set_unit_phase`.
    pub fn manual() -> Self {
        Self {
            auto_ready: false,
            ..Self::new()
        }
    }

    /// Make the next call to `op` fail with `err`.
    pub async fn inject_fault(&self, op: ClusterOp, err: ClusterError) {
        self.state.lock().await.faults.insert(op, err);
    }

    pub async fn set_unit_phase(
        &self,
        namespace: &str,
        name: &str,
        phase: UnitPhase,
    ) -> Result<(), ClusterError> {
        let owner = {
            let mut state = self.state.lock().await;
            let unit = state
                .units
                .get_mut(&(namespace.to_string(), name.to_string()))
                .ok_or_else(|| ClusterError::NotFound {
                    kind: UNIT_KIND,
                    name: name.to_string(),
                })?;
            unit.phase = phase;
            owner_key(&unit.spec.labels)
        };
        self.announce(owner);
        Ok(())
    }

    pub async fn binding_count(&self) -> usize {
        self.state.lock().await.bindings.len()
    }

    pub async fn unit_count(&self) -> usize {
        self.state.lock().await.units.len()
    }

    /// Successful create calls, `AlreadyExists` excluded.
    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.creates
    }

    /// Successful delete calls, `NotFound` excluded.
    pub async fn delete_calls(&self) -> usize {
        self.state.lock().await.deletes
    }

    pub async fn has_binding(&self, namespace: &str, name: &str) -> bool {
        self.state
            .lock()
            .await
            .bindings
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Remove every resource owned by `owner`.
    pub async fn collect_owned_by(&self, owner: &ResourceKey) {
        let mut state = self.state.lock().await;
        let owned = |o: &crate::domain::OwnerRef| {
            o.namespace == owner.namespace && o.name == owner.name
        };
        let before = state.units.len() + state.bindings.len();
        state.units.retain(|_, unit| !owned(&unit.spec.owner));
        state.bindings.retain(|_, binding| !owned(&binding.owner));
        let collected = before - state.units.len() - state.bindings.len();
        if collected > 0 {
            debug!(owner = %owner, collected, "garbage-collected owned resources");
        }
    }

    fn announce(&self, owner: Option<ResourceKey>) {
        if let Some(key) = owner {
            let _ = self.tx.send(key);
        }
    }
}

impl Default for InMemoryExecutionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionClient for InMemoryExecutionClient {
    async fn create_identity_binding(
        &self,
        spec: &IdentityBindingSpec,
    ) -> Result<(), ClusterError> {
        {
            let mut state = self.state.lock().await;
            state.take_fault(ClusterOp::CreateIdentityBinding)?;
            let key = (spec.namespace.clone(), spec.name.clone());
            if state.bindings.contains_key(&key) {
                return Err(ClusterError::AlreadyExists {
                    kind: BINDING_KIND,
                    name: spec.name.clone(),
                });
            }
            state.bindings.insert(key, spec.clone());
            state.creates += 1;
        }
        self.announce(owner_key(&spec.labels));
        Ok(())
    }

    async fn create_execution_unit(&self, spec: &ExecutionUnitSpec) -> Result<(), ClusterError> {
        {
            let mut state = self.state.lock().await;
            state.take_fault(ClusterOp::CreateExecutionUnit)?;
            let key = (spec.namespace.clone(), spec.name.clone());
            if state.units.contains_key(&key) {
                return Err(ClusterError::AlreadyExists {
                    kind: UNIT_KIND,
                    name: spec.name.clone(),
                });
            }
            let phase = if self.auto_ready {
                UnitPhase::Running
            } else {
                UnitPhase::Pending
            };
            state.units.insert(
                key,
                ExecutionUnit {
                    spec: spec.clone(),
                    phase,
                },
            );
            state.creates += 1;
        }
        self.announce(owner_key(&spec.labels));
        Ok(())
    }

    async fn get_execution_unit(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ExecutionUnit>, ClusterError> {
        let mut state = self.state.lock().await;
        state.take_fault(ClusterOp::GetExecutionUnit)?;
        Ok(state
            .units
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_execution_units(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> Result<Vec<ExecutionUnit>, ClusterError> {
        let state = self.state.lock().await;
        Ok(state
            .units
            .values()
            .filter(|unit| unit.spec.namespace == namespace)
            .filter(|unit| {
                selector
                    .iter()
                    .all(|(k, v)| unit.spec.labels.get(*k).map(String::as_str) == Some(*v))
            })
            .cloned()
            .collect())
    }

    async fn delete_execution_unit(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let removed = {
            let mut state = self.state.lock().await;
            state.take_fault(ClusterOp::DeleteExecutionUnit)?;
            let removed = state
                .units
                .remove(&(namespace.to_string(), name.to_string()))
                .ok_or_else(|| ClusterError::NotFound {
                    kind: UNIT_KIND,
                    name: name.to_string(),
                })?;
            state.deletes += 1;
            removed
        };
        self.announce(owner_key(&removed.spec.labels));
        Ok(())
    }

    async fn delete_identity_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let removed = {
            let mut state = self.state.lock().await;
            state.take_fault(ClusterOp::DeleteIdentityBinding)?;
            let removed = state
                .bindings
                .remove(&(namespace.to_string(), name.to_string()))
                .ok_or_else(|| ClusterError::NotFound {
                    kind: BINDING_KIND,
                    name: name.to_string(),
                })?;
            state.deletes += 1;
            removed
        };
        self.announce(owner_key(&removed.labels));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceKey> {
        self.tx.subscribe()
    }
}
