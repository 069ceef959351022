//! JobStore port - job resource の正本（source of truth）
//!
//! The store persists job resources and announces every change. The
//! controller never caches what it reads here: each pass fetches afresh and
//! writes status back with the resource version it observed.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{AerJob, AerJobStatus, ResourceKey, StoreError};

/// Persistence and change-notification substrate for job resources.
///
/// # 設計原則
/// - `status` is written only through `update_status`
/// - writes carry the observed `resource_version`; a mismatch is a `Conflict`
/// - a deleted resource is simply absent (`get` returns `None`)
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, key: &ResourceKey) -> Result<Option<AerJob>, StoreError>;

    /// Replace `status`, provided the stored version still equals `expected_version`.
    async fn update_status(
        &self,
        key: &ResourceKey,
        expected_version: u64,
        status: AerJobStatus,
    ) -> Result<AerJob, StoreError>;

    async fn list(&self) -> Result<Vec<AerJob>, StoreError>;

    /// Stream of keys whose resource changed.
    fn subscribe(&self) -> broadcast::Receiver<ResourceKey>;
}
