//! `Pending`: wait for the execution unit, then hand the payload to the backend.

use async_trait::async_trait;
use tracing::{debug, info};

use super::PhaseHandler;
use super::resources::ensure_execution_resources;
use crate::app::context::Context;
use crate::app::status_writer::{fail, transition};
use crate::domain::{
    AerJob, BackendError, ClusterError, JobPhase, ReconcileError, Requeue, SubmitRequest,
    UnitPhase,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct PendingHandler;

impl PendingHandler {
    async fn submit(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        let request = SubmitRequest {
            submission_key: job.submission_key(),
            circuits_qpy: job.spec.circuits_qpy.clone(),
            shots: job.spec.shots,
            backend: job.spec.backend.clone(),
            execution_unit: ctx.execution_unit_name(job),
        };
        match ctx.backend.submit(&request).await {
            Ok(backend_job_id) => {
                info!(key = %job.key(), %backend_job_id, "submitted to backend");
                transition(ctx, job, JobPhase::Progress, |status| {
                    status.backend_job_id = Some(backend_job_id);
                })
                .await?;
                Ok(Requeue::Immediate)
            }
            Err(BackendError::Rejected(reason)) => {
                fail(ctx, job, format!("backend rejected payload: {reason}")).await?;
                Ok(Requeue::Immediate)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl PhaseHandler for PendingHandler {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        if let Some(reason) = &job.status.creation_error {
            fail(ctx, job, format!("execution resources rejected: {reason}")).await?;
            return Ok(Requeue::Immediate);
        }

        let name = ctx.execution_unit_name(job);
        let unit = ctx
            .cluster
            .get_execution_unit(&job.metadata.namespace, &name)
            .await?;

        match unit.map(|unit| unit.phase) {
            None => {
                debug!(key = %job.key(), unit = %name, "execution unit missing, recreating");
                match ensure_execution_resources(ctx, job).await {
                    Ok(()) => Ok(Requeue::After(ctx.config.pending_requeue())),
                    Err(ClusterError::Rejected(reason)) => {
                        fail(ctx, job, format!("execution resources rejected: {reason}")).await?;
                        Ok(Requeue::Immediate)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Some(UnitPhase::Pending) => Ok(Requeue::After(ctx.config.pending_requeue())),
            Some(UnitPhase::Failed(reason)) => {
                fail(ctx, job, format!("execution unit failed: {reason}")).await?;
                Ok(Requeue::Immediate)
            }
            Some(UnitPhase::Running | UnitPhase::Succeeded) => self.submit(ctx, job).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::Harness;
    use crate::config::ControllerConfig;
    use crate::domain::AerJobSpec;
    use crate::impls::{InMemoryExecutionClient, SimulatedBackend};
    use std::time::Duration;

    async fn provisioned(h: &Harness, name: &str, spec: AerJobSpec) -> AerJob {
        let job = h.seed(name, spec, JobPhase::Pending, 5).await;
        ensure_execution_resources(&h.ctx, &job).await.unwrap();
        h.fetch(name).await
    }

    #[tokio::test]
    async fn waits_while_unit_is_starting() {
        let h = Harness::with(
            InMemoryExecutionClient::manual(),
            SimulatedBackend::new(0),
            ControllerConfig::default(),
        );
        let job = provisioned(&h, "bell", AerJobSpec::new("UVBZ")).await;

        let requeue = PendingHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(5)));
        assert_eq!(h.fetch("bell").await.status.phase, JobPhase::Pending);
        assert_eq!(h.backend.submitted().await, 0);
    }

    #[tokio::test]
    async fn running_unit_submits_and_progresses() {
        let h = Harness::new();
        let job = provisioned(&h, "bell", AerJobSpec::new("UVBZ")).await;

        let requeue = PendingHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(requeue, Requeue::Immediate);

        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::Progress);
        assert!(job.status.backend_job_id.is_some());
    }

    #[tokio::test]
    async fn resubmission_after_lost_write_reuses_backend_job() {
        let h = Harness::new();
        let job = provisioned(&h, "bell", AerJobSpec::new("UVBZ")).await;
        h.store
            .fail_next_update(crate::domain::StoreError::Unavailable("etcd leader lost".into()))
            .await;

        assert!(PendingHandler.handle(&h.ctx, &job).await.is_err());
        PendingHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(h.backend.submitted().await, 1);
    }

    #[tokio::test]
    async fn failed_unit_fails_the_job() {
        let h = Harness::with(
            InMemoryExecutionClient::manual(),
            SimulatedBackend::new(0),
            ControllerConfig::default(),
        );
        let job = provisioned(&h, "bell", AerJobSpec::new("UVBZ")).await;
        h.cluster
            .set_unit_phase("quantum", "aerjob-bell", UnitPhase::Failed("ImagePullBackOff".into()))
            .await
            .unwrap();

        PendingHandler.handle(&h.ctx, &job).await.unwrap();
        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::Failed);
        assert_eq!(
            job.status.error.as_deref(),
            Some("execution unit failed: ImagePullBackOff")
        );
    }

    #[tokio::test]
    async fn recorded_creation_error_fails_the_job() {
        let h = Harness::new();
        let mut job = AerJob::new("quantum", "bell", AerJobSpec::new("UVBZ"));
        job.status.phase = JobPhase::Pending;
        job.status.creation_error = Some("quota exceeded".into());
        let job = h.store.restore(job).await.unwrap();

        PendingHandler.handle(&h.ctx, &job).await.unwrap();
        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::Failed);
        assert!(job.status.error.unwrap().contains("quota exceeded"));
        assert!(job.status.completion_time.is_some());
    }

    #[tokio::test]
    async fn backend_rejection_fails_the_job() {
        let h = Harness::new();
        let job = provisioned(&h, "bell", AerJobSpec::new("")).await;

        PendingHandler.handle(&h.ctx, &job).await.unwrap();
        let job = h.fetch("bell").await;
        assert_eq!(job.status.phase, JobPhase::Failed);
        assert!(job.status.backend_job_id.is_none());
    }

    #[tokio::test]
    async fn missing_unit_is_recreated() {
        let h = Harness::new();
        let job = h.seed("bell", AerJobSpec::new("UVBZ"), JobPhase::Pending, 5).await;

        let requeue = PendingHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(5)));
        assert_eq!(h.cluster.unit_count().await, 1);
        assert_eq!(h.fetch("bell").await.status.phase, JobPhase::Pending);
    }

    #[tokio::test]
    async fn backend_outage_is_transient() {
        let h = Harness::new();
        let job = provisioned(&h, "bell", AerJobSpec::new("UVBZ")).await;
        h.backend
            .fail_next_submit(BackendError::Unavailable("429 Too Many Requests".into()))
            .await;

        let err = PendingHandler.handle(&h.ctx, &job).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(h.fetch("bell").await.status.phase, JobPhase::Pending);
    }
}
