//! Per-key state machine for the work queue.

use serde::{Deserialize, Serialize};

/// Where a resource identity currently sits in the work queue.
///
/// State transitions:
/// - Idle -> Queued (add)
/// - Queued -> Processing (get)
/// - Processing -> Idle (done)
/// - Processing -> Dirty (add while a worker holds the key)
/// - Dirty -> Queued (done)
///
/// A key is handed to at most one worker at a time: `get` only takes keys
/// from `Queued`, and a key that changes while `Processing` waits in `Dirty`
/// until its worker calls `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    /// Known only because it has a failure count.
    Idle,

    /// Waiting in the ready queue.
    Queued,

    /// Held by a worker.
    Processing,

    /// Held by a worker and changed since; requeued on `done`.
    Dirty,
}
