//! Reconciliation dispatcher: one pass over one job.

use std::sync::Arc;

use tracing::{Instrument, debug, info_span, warn};

use super::context::Context;
use super::registry::HandlerRegistry;
use super::timeout::{self, TimeoutCheck};
use crate::domain::{ReconcileError, Requeue, ResourceKey};

/// Fetches a job, decides which handler owns it right now and runs that
/// handler. Never sleeps: waiting is expressed through the returned
/// [`Requeue`].
#[derive(Clone)]
pub struct Reconciler {
    ctx: Arc<Context>,
    handlers: Arc<HandlerRegistry>,
}

impl Reconciler {
    pub fn new(ctx: Arc<Context>, handlers: Arc<HandlerRegistry>) -> Self {
        Self { ctx, handlers }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub async fn reconcile(&self, key: &ResourceKey) -> Result<Requeue, ReconcileError> {
        let pass = self.ctx.ids.generate_pass_id();
        let span = info_span!("reconcile", key = %key, pass = %pass);
        self.reconcile_once(key).instrument(span).await
    }

    async fn reconcile_once(&self, key: &ResourceKey) -> Result<Requeue, ReconcileError> {
        let Some(job) = self.ctx.store.get(key).await? else {
            debug!("job no longer exists");
            return Ok(Requeue::Never);
        };

        if let TimeoutCheck::Expired { elapsed, limit } =
            timeout::evaluate(&job.spec, &job.status, self.ctx.clock.now())
        {
            debug!(
                phase = %job.status.phase,
                elapsed_secs = elapsed.num_seconds(),
                limit_secs = limit.num_seconds(),
                "timeout expired"
            );
            return self.handlers.timeout().handle(&self.ctx, &job).await;
        }

        let phase = job.phase();
        let Some(handler) = self.handlers.get(phase) else {
            warn!(phase = %phase, "no handler for phase, leaving job alone");
            return Ok(Requeue::Never);
        };
        debug!(phase = %phase, version = job.metadata.resource_version, "dispatching");
        handler.handle(&self.ctx, &job).await
    }
}
