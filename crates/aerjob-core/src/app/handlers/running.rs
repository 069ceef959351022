//! `Progress`: poll the backend until it reports an outcome.

use async_trait::async_trait;
use tracing::debug;

use super::PhaseHandler;
use crate::app::context::Context;
use crate::app::status_writer::{fail, transition};
use crate::domain::{AerJob, BackendError, BackendPoll, JobPhase, ReconcileError, Requeue};

#[derive(Debug, Default, Clone, Copy)]
pub struct RunningHandler;

#[async_trait]
impl PhaseHandler for RunningHandler {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        let Some(backend_job_id) = job.status.backend_job_id.as_deref() else {
            fail(ctx, job, "no backend job recorded for running job").await?;
            return Ok(Requeue::Immediate);
        };

        match ctx.backend.poll(backend_job_id).await {
            Ok(BackendPoll::Pending | BackendPoll::Running) => {
                debug!(key = %job.key(), backend_job_id, "still running");
                Ok(Requeue::After(ctx.config.poll_interval()))
            }
            Ok(BackendPoll::Succeeded(result)) => {
                let now = ctx.clock.now();
                transition(ctx, job, JobPhase::Completed, |status| {
                    status.result = Some(result);
                    status.completion_time = Some(now);
                })
                .await?;
                Ok(Requeue::Immediate)
            }
            Ok(BackendPoll::Failed(reason)) => {
                fail(ctx, job, format!("backend job failed: {reason}")).await?;
                Ok(Requeue::Immediate)
            }
            Err(BackendError::UnknownJob(id)) => {
                fail(ctx, job, format!("backend no longer knows job {id}")).await?;
                Ok(Requeue::Immediate)
            }
            Err(err) => Err(err.into()),
        }
    }
}
