//! `Completed` / `Failed`: release execution resources, never touch status.

use async_trait::async_trait;

use super::PhaseHandler;
use super::resources::cleanup_execution_resources;
use crate::app::context::Context;
use crate::domain::{AerJob, ReconcileError, Requeue};

async fn settle(ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
    if ctx.config.cleanup_on_completion {
        cleanup_execution_resources(ctx, job).await?;
    }
    Ok(Requeue::Never)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CompletedHandler;

#[async_trait]
impl PhaseHandler for CompletedHandler {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        settle(ctx, job).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FailedHandler;

#[async_trait]
impl PhaseHandler for FailedHandler {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError> {
        settle(ctx, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handlers::resources::ensure_execution_resources;
    use crate::app::testing::Harness;
    use crate::config::ControllerConfig;
    use crate::domain::{AerJobSpec, JobPhase};
    use crate::impls::{InMemoryExecutionClient, SimulatedBackend};
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case::completed(JobPhase::Completed, Arc::new(CompletedHandler) as Arc<dyn PhaseHandler>)]
    #[case::failed(JobPhase::Failed, Arc::new(FailedHandler) as Arc<dyn PhaseHandler>)]
    #[tokio::test]
    async fn terminal_passes_clean_up_and_leave_status_alone(
        #[case] phase: JobPhase,
        #[case] handler: Arc<dyn PhaseHandler>,
    ) {
        let h = Harness::new();
        let job = h.seed("bell", AerJobSpec::new("UVBZ"), phase, 120).await;
        ensure_execution_resources(&h.ctx, &job).await.unwrap();

        for _ in 0..2 {
            let requeue = handler.handle(&h.ctx, &job).await.unwrap();
            assert_eq!(requeue, Requeue::Never);
        }

        let after = h.fetch("bell").await;
        assert_eq!(after, job);
        assert_eq!(h.cluster.unit_count().await, 0);
        assert_eq!(h.cluster.binding_count().await, 0);
        assert_eq!(h.backend.submitted().await, 0);
    }

    #[tokio::test]
    async fn cleanup_can_be_disabled() {
        let config = ControllerConfig {
            cleanup_on_completion: false,
            ..Default::default()
        };
        let h = Harness::with(InMemoryExecutionClient::new(), SimulatedBackend::new(0), config);
        let job = h.seed("bell", AerJobSpec::new("UVBZ"), JobPhase::Completed, 120).await;
        ensure_execution_resources(&h.ctx, &job).await.unwrap();

        CompletedHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(h.cluster.unit_count().await, 1);
    }
}
