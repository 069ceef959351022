//! Queue module: per-identity work queue with delayed and backoff requeues.
//!
//! This is the concurrency primitive the reconciliation core depends on for
//! correctness: one resource identity is never reconciled by two workers at
//! once.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::WorkQueue;
pub use record::KeyRecord;
pub use retry::RetryPolicy;
pub use state::KeyState;

use serde::{Deserialize, Serialize};

/// Snapshot of the queue for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub processing: usize,
    /// Processing keys that changed while held and will run again.
    pub dirty: usize,
    /// Pending delayed adds.
    pub scheduled: usize,
    /// Keys with a non-zero failure count.
    pub backing_off: usize,
}
