//! Key record: queue state + failure count for one identity.

use tokio::time::Instant;

use super::KeyState;

/// Bookkeeping for one resource identity.
///
/// Design:
/// - This is the single source of truth for where a key is.
/// - The ready and scheduled structures hold keys only.
/// - All state transitions happen here.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub state: KeyState,

    /// Consecutive transient failures, reset by `forget`.
    pub failures: u32,

    pub updated_at: Instant,
}

impl KeyRecord {
    pub fn new() -> Self {
        Self {
            state: KeyState::Idle,
            failures: 0,
            updated_at: Instant::now(),
        }
    }

    /// Mark as queued. Returns true when the key must be pushed to the ready queue.
    pub fn enqueue(&mut self) -> bool {
        let push = match self.state {
            KeyState::Idle => {
                self.state = KeyState::Queued;
                true
            }
            KeyState::Processing => {
                self.state = KeyState::Dirty;
                false
            }
            KeyState::Queued | KeyState::Dirty => false,
        };
        self.updated_at = Instant::now();
        push
    }

    /// Mark as handed to a worker.
    pub fn start_processing(&mut self) {
        self.state = KeyState::Processing;
        self.updated_at = Instant::now();
    }

    /// Mark as released by its worker. Returns true when the key must be requeued.
    pub fn finish_processing(&mut self) -> bool {
        let requeue = self.state == KeyState::Dirty;
        self.state = if requeue {
            KeyState::Queued
        } else {
            KeyState::Idle
        };
        self.updated_at = Instant::now();
        requeue
    }

    pub fn record_failure(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.updated_at = Instant::now();
        self.failures
    }

    /// Nothing left worth remembering about this key.
    pub fn is_disposable(&self) -> bool {
        self.state == KeyState::Idle && self.failures == 0
    }
}

impl Default for KeyRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_while_processing_marks_dirty_and_requeues_on_done() {
        let mut record = KeyRecord::new();
        assert!(record.enqueue());
        record.start_processing();

        assert!(!record.enqueue());
        assert_eq!(record.state, KeyState::Dirty);

        assert!(record.finish_processing());
        assert_eq!(record.state, KeyState::Queued);
    }

    #[test]
    fn repeated_add_is_deduplicated() {
        let mut record = KeyRecord::new();
        assert!(record.enqueue());
        assert!(!record.enqueue());
        assert_eq!(record.state, KeyState::Queued);
    }

    #[test]
    fn clean_finish_goes_idle() {
        let mut record = KeyRecord::new();
        record.enqueue();
        record.start_processing();
        assert!(!record.finish_processing());
        assert!(record.is_disposable());
    }
}
