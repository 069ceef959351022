//! Requeue directive: when should this identity be reconciled again?

use std::time::Duration;

/// The next scheduling action for a resource identity.
///
/// Handlers return this; the controller hands it to the work queue. Nothing
/// in the reconciliation core sleeps on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Reconcile again as soon as a worker is free.
    Immediate,

    /// Reconcile again after the given delay.
    After(Duration),

    /// Wait for the next change notification.
    Never,
}
