//! `New`: provision execution resources and start the clock.

use async_trait::async_trait;
use tracing::warn;

use super::PhaseHandler;
use super::resources::ensure_execution_resources;
use crate::app::context::Context;
use crate::app::status_writer::transition;
use crate::domain::{AerJob, ClusterError, JobPhase, ReconcileError, Requeue};

#[derive(Debug, Default, Clone, Copy)]
pub struct NewJobHandler;

#[async_trait]
impl PhaseHandler for NewJobHandler {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        let creation_error = match ensure_execution_resources(ctx, job).await {
            Ok(()) => None,
            Err(ClusterError::Rejected(reason)) => {
                warn!(key = %job.key(), %reason, "execution resources rejected");
                Some(reason)
            }
            Err(err) => return Err(err.into()),
        };

        let unit = ctx.execution_unit_name(job);
        let binding = ctx.identity_binding_name(job);
        let now = ctx.clock.now();
        transition(ctx, job, JobPhase::Pending, |status| {
            if status.start_time.is_none() {
                status.start_time = Some(now);
            }
            status.execution_unit = Some(unit);
            status.identity_binding = Some(binding);
            status.creation_error = creation_error;
        })
        .await?;
        Ok(Requeue::Immediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{Harness, t0};
    use crate::domain::{AerJobSpec, StoreError};
    use crate::impls::ClusterOp;

    #[tokio::test]
    async fn provisions_and_moves_to_pending() {
        let h = Harness::new();
        let job = h.submit("bell", AerJobSpec::new("UVBZ")).await;

        let requeue = NewJobHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(requeue, Requeue::Immediate);

        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::Pending);
        assert_eq!(job.status.start_time, Some(t0()));
        assert_eq!(job.status.execution_unit.as_deref(), Some("aerjob-bell"));
        assert_eq!(job.status.identity_binding.as_deref(), Some("aerjob-bell-runner"));
        assert!(job.status.creation_error.is_none());
        assert!(h.cluster.has_binding("quantum", "aerjob-bell-runner").await);
    }

    #[tokio::test]
    async fn repeated_invocation_on_stale_state_creates_nothing_new() {
        let h = Harness::new();
        let stale = h.submit("bell", AerJobSpec::new("UVBZ")).await;

        NewJobHandler.handle(&h.ctx, &stale).await.unwrap();
        let first = h.fetch("bell").await;

        h.clock.advance(chrono::Duration::seconds(30));
        let err = NewJobHandler.handle(&h.ctx, &stale).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(StoreError::Conflict { .. })));
        assert!(err.is_transient());

        let second = h.fetch("bell").await;
        assert_eq!(second.status.start_time, first.status.start_time);
        assert_eq!(second.metadata.resource_version, first.metadata.resource_version);
        assert_eq!(h.cluster.unit_count().await, 1);
        assert_eq!(h.cluster.binding_count().await, 1);
        assert_eq!(h.cluster.create_calls().await, 2);
    }

    #[tokio::test]
    async fn binding_outage_leaves_job_untouched() {
        let h = Harness::new();
        let job = h.submit("bell", AerJobSpec::new("UVBZ")).await;
        h.cluster
            .inject_fault(
                ClusterOp::CreateIdentityBinding,
                ClusterError::Unavailable("apiserver down".into()),
            )
            .await;

        let err = NewJobHandler.handle(&h.ctx, &job).await.unwrap_err();
        assert!(err.is_transient());

        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::New);
        assert!(job.status.start_time.is_none());
        assert_eq!(h.cluster.unit_count().await, 0);
    }

    #[tokio::test]
    async fn rejection_is_recorded_for_the_pending_phase() {
        let h = Harness::new();
        let job = h.submit("bell", AerJobSpec::new("UVBZ")).await;
        h.cluster
            .inject_fault(
                ClusterOp::CreateExecutionUnit,
                ClusterError::Rejected("image not allowed".into()),
            )
            .await;

        NewJobHandler.handle(&h.ctx, &job).await.unwrap();

        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::Pending);
        assert_eq!(job.status.creation_error.as_deref(), Some("image not allowed"));
    }
}
