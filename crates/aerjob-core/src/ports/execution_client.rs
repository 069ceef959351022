//! ExecutionClient port - execution unit / identity binding の操作
//!
//! Creation is not required to be idempotent on the cluster side: an existing
//! object is reported as `ClusterError::AlreadyExists`, and callers that want
//! create-or-confirm semantics treat that as success.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{
    ClusterError, ExecutionUnit, ExecutionUnitSpec, IdentityBindingSpec, ResourceKey,
};

#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn create_identity_binding(&self, spec: &IdentityBindingSpec)
    -> Result<(), ClusterError>;

    async fn create_execution_unit(&self, spec: &ExecutionUnitSpec) -> Result<(), ClusterError>;

    async fn get_execution_unit(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ExecutionUnit>, ClusterError>;

    /// Units in `namespace` whose labels contain every `selector` pair.
    async fn list_execution_units(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> Result<Vec<ExecutionUnit>, ClusterError>;

    async fn delete_execution_unit(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn delete_identity_binding(&self, namespace: &str, name: &str)
    -> Result<(), ClusterError>;

    /// Owner keys of execution resources that changed.
    fn subscribe(&self) -> broadcast::Receiver<ResourceKey>;
}
