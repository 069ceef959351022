//! Forced failure of a job that outlived `spec.timeout`.

use async_trait::async_trait;
use chrono::Duration;
use tracing::{info, warn};

use super::PhaseHandler;
use super::resources::cleanup_execution_resources;
use crate::app::context::Context;
use crate::app::status_writer::fail;
use crate::domain::{AerJob, EventReason, ReconcileError, Requeue};

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeoutHandler;

#[async_trait]
impl PhaseHandler for TimeoutHandler {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        let elapsed = job
            .status
            .start_time
            .map(|start| ctx.clock.now() - start)
            .unwrap_or_else(Duration::zero);
        let limit = job.spec.timeout;

        if let Some(backend_job_id) = job.status.backend_job_id.as_deref() {
            if let Err(err) = ctx.backend.cancel(backend_job_id).await {
                warn!(key = %job.key(), backend_job_id, error = %err, "backend cancel failed");
            }
        }

        fail(
            ctx,
            job,
            format!(
                "timeout exceeded: ran {}s, limit {}s",
                elapsed.num_seconds(),
                limit
            ),
        )
        .await?;
        info!(key = %job.key(), elapsed_secs = elapsed.num_seconds(), limit_secs = limit, "timed out");
        ctx.emit(
            job.key(),
            EventReason::TimedOut {
                elapsed_secs: elapsed.num_seconds(),
                limit_secs: limit,
            },
        );

        if ctx.config.cleanup_on_completion {
            cleanup_execution_resources(ctx, job).await?;
        }
        Ok(Requeue::Never)
    }
}
