//! Phase handlers.
//!
//! Each lifecycle phase maps to one handler object. A handler reads the job
//! it is given, performs side effects through the context's ports and moves
//! the job forward through the status writer at most once per call.
//!
//! Handlers are invoked with at most one pass in flight per job, and every
//! side effect they perform is safe to repeat: a redelivered notification
//! looks exactly like a genuine re-check.

use async_trait::async_trait;

use super::context::Context;
use crate::domain::{AerJob, ReconcileError, Requeue};

pub mod new_job;
pub mod pending;
pub mod resources;
pub mod running;
pub mod terminal;
pub mod timeout;

pub use self::new_job::NewJobHandler;
pub use self::pending::PendingHandler;
pub use self::running::RunningHandler;
pub use self::terminal::{CompletedHandler, FailedHandler};
pub use self::timeout::TimeoutHandler;

/// A handler for one lifecycle phase.
///
/// `Err` means "transient, retry with backoff": the job's status has not been
/// touched. Definitive outcomes are written to status and returned as `Ok`.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    async fn handle(&self, ctx: &Context, job: &AerJob) -> Result<Requeue, ReconcileError>;
}
