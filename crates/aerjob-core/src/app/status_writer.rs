//! Status writer: the only path by which `status` changes.

use tracing::info;

use super::context::Context;
use crate::domain::{AerJob, AerJobStatus, EventReason, JobPhase, ReconcileError};

/// Move `job` to `next`, applying `mutate` to its status on the way.
///
/// The write is conditional on the resource version the caller read, so a
/// pass working from stale state loses with `StoreError::Conflict` instead of
/// overwriting a newer status. Edges the lifecycle does not allow are refused
/// before anything is written, and a `startTime` once set is carried over
/// whatever `mutate` does.
pub async fn transition<F>(
    ctx: &Context,
    job: &AerJob,
    next: JobPhase,
    mutate: F,
) -> Result<AerJob, ReconcileError>
where
    F: FnOnce(&mut AerJobStatus),
{
    let from = job.status.phase.clone();
    if !from.can_transition_to(&next) {
        return Err(ReconcileError::InvalidTransition { from, to: next });
    }

    let mut status = job.status.clone();
    mutate(&mut status);
    status.phase = next.clone();
    if job.status.start_time.is_some() {
        status.start_time = job.status.start_time;
    }

    let key = job.key();
    let updated = ctx
        .store
        .update_status(&key, job.metadata.resource_version, status)
        .await?;

    info!(key = %key, from = %from, to = %next, "phase changed");
    ctx.emit(key, EventReason::PhaseChanged { from, to: next });
    Ok(updated)
}

/// Shorthand for a definitive failure carrying `error`.
pub async fn fail(
    ctx: &Context,
    job: &AerJob,
    error: impl Into<String>,
) -> Result<AerJob, ReconcileError> {
    let error = error.into();
    let now = ctx.clock.now();
    transition(ctx, job, JobPhase::Failed, |status| {
        status.error = Some(error);
        status.completion_time = Some(now);
    })
    .await
}
