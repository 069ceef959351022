//! In-memory keyed work queue.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::{KeyRecord, KeyState, QueueCounts, RetryPolicy};
use crate::domain::ResourceKey;

/// Stand-in deadline for delays too large for `Instant` (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Scheduled entry for the delay heap.
///
/// Reverse ordering so `BinaryHeap` acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledKey {
    ready_at: Instant,
    key: ResourceKey,
}

impl PartialOrd for ScheduledKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.key.cmp(&self.key))
    }
}

struct WorkQueueState {
    /// Every key with queue state or a failure count.
    records: HashMap<ResourceKey, KeyRecord>,

    /// Ready keys, FIFO. Each key appears at most once.
    ready: VecDeque<ResourceKey>,

    /// Delayed adds (requeue-after and backoff).
    scheduled: BinaryHeap<ScheduledKey>,

    retry_policy: RetryPolicy,

    shutting_down: bool,
}

impl WorkQueueState {
    fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            retry_policy,
            shutting_down: false,
        }
    }

    /// Returns true when a waiting worker should be woken.
    fn add(&mut self, key: ResourceKey) -> bool {
        let record = self.records.entry(key.clone()).or_default();
        if record.enqueue() {
            self.ready.push_back(key);
            true
        } else {
            false
        }
    }

    /// Move keys whose delay has elapsed into the ready queue.
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.ready_at > now {
                break;
            }
            if let Some(entry) = self.scheduled.pop() {
                self.add(entry.key);
            }
        }
    }

    fn pop_ready(&mut self) -> Option<ResourceKey> {
        let key = self.ready.pop_front()?;
        if let Some(record) = self.records.get_mut(&key) {
            record.start_processing();
        }
        Some(key)
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            scheduled: self.scheduled.len(),
            ..QueueCounts::default()
        };
        for record in self.records.values() {
            match record.state {
                KeyState::Queued => counts.queued += 1,
                KeyState::Processing => counts.processing += 1,
                KeyState::Dirty => {
                    counts.processing += 1;
                    counts.dirty += 1;
                }
                KeyState::Idle => {}
            }
            if record.failures > 0 {
                counts.backing_off += 1;
            }
        }
        counts
    }
}

/// Work queue keyed on resource identity.
///
/// Guarantees at most one in-flight reconciliation per key: a key handed
/// out by `get` is not handed out again until `done` is called for it, and
/// adds that arrive meanwhile collapse into a single follow-up pass.
#[derive(Clone)]
pub struct WorkQueue {
    state: Arc<Mutex<WorkQueueState>>,
    notify: Arc<Notify>,
}

impl WorkQueue {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorkQueueState::new(retry_policy))),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Queue a key for reconciliation (deduplicated).
    pub async fn add(&self, key: ResourceKey) {
        let wake = {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                return;
            }
            state.add(key)
        };
        if wake {
            self.notify.notify_one();
        }
    }

    /// Queue a key once `delay` has elapsed.
    pub async fn add_after(&self, key: ResourceKey, delay: Duration) {
        if delay.is_zero() {
            return self.add(key).await;
        }
        {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                return;
            }
            state.scheduled.push(ScheduledKey {
                ready_at: deadline_after(delay),
                key,
            });
        }
        // Waiting workers recompute their wake-up time.
        self.notify.notify_waiters();
    }

    /// Queue a key after the backoff for its failure count. Returns the delay used.
    pub async fn add_rate_limited(&self, key: ResourceKey) -> Duration {
        let delay = {
            let mut state = self.state.lock().await;
            let failures = state.records.entry(key.clone()).or_default().record_failure();
            state.retry_policy.next_delay(failures)
        };
        self.add_after(key, delay).await;
        delay
    }

    /// Reset the failure count of a key.
    pub async fn forget(&self, key: &ResourceKey) {
        let mut state = self.state.lock().await;
        let disposable = match state.records.get_mut(key) {
            Some(record) => {
                record.failures = 0;
                record.is_disposable()
            }
            None => false,
        };
        if disposable {
            state.records.remove(key);
        }
    }

    pub async fn num_requeues(&self, key: &ResourceKey) -> u32 {
        let state = self.state.lock().await;
        state.records.get(key).map_or(0, |r| r.failures)
    }

    /// Take the next ready key, waiting until one is available.
    ///
    /// Returns `None` once the queue is shutting down.
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting state so no wake-up is lost.
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                state.promote_scheduled();
                if let Some(key) = state.pop_ready() {
                    return Some(key);
                }
                state.scheduled.peek().map(|entry| entry.ready_at)
            };

            match next_wake {
                Some(wake_at) => {
                    tokio::select! {
                        _ = &mut notified => {},
                        _ = tokio::time::sleep_until(wake_at) => {},
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Release a key taken with `get`.
    pub async fn done(&self, key: &ResourceKey) {
        let wake = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(record) = state.records.get_mut(key) else {
                return;
            };
            let requeue = record.finish_processing();
            let disposable = record.is_disposable();
            if requeue {
                state.ready.push_back(key.clone());
            } else if disposable {
                state.records.remove(key);
            }
            requeue
        };
        if wake {
            self.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiting worker.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().await;
            state.shutting_down = true;
        }
        self.notify.notify_waiters();
    }

    pub async fn counts(&self) -> QueueCounts {
        self.state.lock().await.counts()
    }
}
