//! Controller - 通知 → キュー → ワーカー
//!
//! Change notifications from the store and the cluster feed a keyed work
//! queue; a fixed pool of workers takes keys from it and runs one
//! reconciliation pass each. The queue guarantees a key is never held by two
//! workers at once, so handlers need no locking of their own.
//!
//! - `shutdown_tx` を送るとフィーダーとワーカーが止まる
//! - in-flight の reconcile は中断しない（次の key を取らないだけ）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::context::Context;
use super::reconciler::Reconciler;
use super::registry::HandlerRegistry;
use crate::domain::{EventReason, ReconcileError, Requeue, ResourceKey, StoreError};
use crate::ports::JobStore;
use crate::queue::WorkQueue;

pub struct Controller {
    reconciler: Reconciler,
    queue: WorkQueue,
    workers: usize,
    reconcile_timeout: Duration,
}

impl Controller {
    pub fn new(ctx: Arc<Context>, handlers: Arc<HandlerRegistry>) -> Self {
        let queue = WorkQueue::new(ctx.config.retry.policy());
        let workers = ctx.config.workers.max(1);
        let reconcile_timeout = ctx.config.reconcile_timeout();
        Self {
            reconciler: Reconciler::new(ctx, handlers),
            queue,
            workers,
            reconcile_timeout,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Subscribe to notifications, enqueue every existing job and spawn the
    /// feeders and workers.
    pub async fn start(self) -> Result<ControllerHandle, StoreError> {
        let ctx = Arc::clone(self.reconciler.context());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Subscribe before listing so nothing written in between is missed.
        let store_rx = ctx.store.subscribe();
        let cluster_rx = ctx.cluster.subscribe();
        let initial = resync(ctx.store.as_ref(), &self.queue).await?;
        info!(jobs = initial, workers = self.workers, "controller started");

        let mut joins = Vec::with_capacity(self.workers + 2);
        for (source, rx) in [("store", store_rx), ("cluster", cluster_rx)] {
            joins.push(tokio::spawn(feed_loop(
                source,
                rx,
                self.queue.clone(),
                Arc::clone(&ctx.store),
                shutdown_rx.clone(),
            )));
        }
        for worker_id in 0..self.workers {
            joins.push(tokio::spawn(worker_loop(
                worker_id,
                self.reconciler.clone(),
                self.queue.clone(),
                self.reconcile_timeout,
                shutdown_rx.clone(),
            )));
        }

        Ok(ControllerHandle {
            shutdown_tx,
            queue: self.queue,
            joins,
        })
    }
}

/// Handle to a running controller.
pub struct ControllerHandle {
    shutdown_tx: watch::Sender<bool>,
    queue: WorkQueue,
    joins: Vec<JoinHandle<()>>,
}

impl ControllerHandle {
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Stop taking new keys. In-flight passes run to completion.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for every feeder and worker.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        self.queue.shutdown().await;
        for join in self.joins {
            let _ = join.await;
        }
        info!("controller stopped");
    }
}

async fn resync(store: &dyn JobStore, queue: &WorkQueue) -> Result<usize, StoreError> {
    let jobs = store.list().await?;
    let count = jobs.len();
    for job in jobs {
        queue.add(job.key()).await;
    }
    Ok(count)
}

async fn feed_loop(
    source: &'static str,
    mut rx: broadcast::Receiver<ResourceKey>,
    queue: WorkQueue,
    store: Arc<dyn JobStore>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            received = rx.recv() => match received {
                Ok(key) => queue.add(key).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(source, missed, "notifications dropped, resyncing");
                    if let Err(err) = resync(store.as_ref(), &queue).await {
                        error!(source, error = %err, "resync failed");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!(source, "feeder stopped");
}

async fn worker_loop(
    worker_id: usize,
    reconciler: Reconciler,
    queue: WorkQueue,
    deadline: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // get は待つ可能性があるので select で shutdown と競合させる
        let key = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            key = queue.get() => key,
        };
        let Some(key) = key else {
            break;
        };

        let result = match tokio::time::timeout(deadline, reconciler.reconcile(&key)).await {
            Ok(result) => result,
            Err(_) => Err(ReconcileError::Cancelled),
        };
        apply_outcome(&reconciler, &queue, &key, result).await;
        queue.done(&key).await;
    }
    debug!(worker_id, "worker stopped");
}

/// Turn the outcome of a pass into queue bookkeeping.
async fn apply_outcome(
    reconciler: &Reconciler,
    queue: &WorkQueue,
    key: &ResourceKey,
    result: Result<Requeue, ReconcileError>,
) {
    match result {
        Ok(Requeue::Never) => queue.forget(key).await,
        Ok(Requeue::Immediate) => {
            queue.forget(key).await;
            queue.add(key.clone()).await;
        }
        Ok(Requeue::After(delay)) => {
            queue.forget(key).await;
            queue.add_after(key.clone(), delay).await;
        }
        Err(err) if err.is_transient() => {
            let delay = queue.add_rate_limited(key.clone()).await;
            let attempts = queue.num_requeues(key).await;
            warn!(
                key = %key,
                error = %err,
                attempts,
                retry_in_ms = delay.as_millis() as u64,
                "reconcile failed, retrying"
            );
            reconciler.context().emit(
                key.clone(),
                EventReason::ReconcileFailed {
                    error: err.to_string(),
                },
            );
        }
        Err(err) => {
            error!(key = %key, error = %err, "reconcile failed permanently");
            queue.forget(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::Harness;
    use crate::config::{ControllerConfig, RetryConfig};
    use crate::domain::{AerJob, AerJobSpec, ClusterError, JobPhase};
    use crate::impls::{ClusterOp, InMemoryExecutionClient, InMemoryJobStore, SimulatedBackend};

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            workers: 3,
            pending_requeue_secs: 0,
            poll_interval_secs: 0,
            retry: RetryConfig {
                base_delay_ms: 1,
                multiplier: 2.0,
                max_delay_secs: 1,
            },
            ..Default::default()
        }
    }

    async fn settled(h: &Harness, names: &[&str]) -> Vec<AerJob> {
        for _ in 0..500 {
            let mut jobs = Vec::new();
            for name in names {
                jobs.push(h.fetch(name).await);
            }
            if jobs.iter().all(|job| job.status.phase.is_terminal()) {
                return jobs;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("jobs did not reach a terminal phase");
    }

    #[tokio::test]
    async fn drives_jobs_to_completion() {
        let h = Harness::with(InMemoryExecutionClient::new(), SimulatedBackend::new(2), fast_config());
        h.submit("before-start", AerJobSpec::new("UVBZ")).await;

        let handle = Controller::new(h.ctx.clone(), Arc::new(HandlerRegistry::standard()))
            .start()
            .await
            .unwrap();
        h.submit("after-start", AerJobSpec::new("UVBZ")).await;
        h.submit("rejected", AerJobSpec::new("")).await;

        let jobs = settled(&h, &["before-start", "after-start", "rejected"]).await;
        handle.shutdown_and_join().await;

        assert_eq!(jobs[0].status.phase, JobPhase::Completed);
        assert_eq!(jobs[1].status.phase, JobPhase::Completed);
        assert_eq!(jobs[2].status.phase, JobPhase::Failed);
        assert_eq!(h.backend.submitted().await, 2);
        assert_eq!(h.cluster.unit_count().await, 0);
        assert_eq!(h.cluster.binding_count().await, 0);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_without_touching_status() {
        let h = Harness::with(InMemoryExecutionClient::new(), SimulatedBackend::new(0), fast_config());
        h.cluster
            .inject_fault(
                ClusterOp::CreateIdentityBinding,
                ClusterError::Unavailable("apiserver down".into()),
            )
            .await;
        let job = h.submit("bell", AerJobSpec::new("UVBZ")).await;

        let handle = Controller::new(h.ctx.clone(), Arc::new(HandlerRegistry::standard()))
            .start()
            .await
            .unwrap();
        let jobs = settled(&h, &["bell"]).await;
        handle.shutdown_and_join().await;

        assert_eq!(jobs[0].status.phase, JobPhase::Completed);
        let failures = h
            .events
            .reasons_for(&job.key())
            .into_iter()
            .filter(|reason| matches!(reason, EventReason::ReconcileFailed { .. }))
            .count();
        assert_eq!(failures, 1);
        assert!(jobs[0].status.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pass_past_its_deadline_is_retried_without_a_phase_change() {
        let config = ControllerConfig {
            reconcile_timeout_secs: 1,
            ..fast_config()
        };
        let backend = SimulatedBackend::new(0).with_latency(Duration::from_secs(5));
        let h = Harness::with(InMemoryExecutionClient::new(), backend, config);
        let job = h.submit("slow", AerJobSpec::new("UVBZ")).await;

        let handle = Controller::new(h.ctx.clone(), Arc::new(HandlerRegistry::standard()))
            .start()
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let backing_off = handle.queue().counts().await.backing_off;
        handle.shutdown_and_join().await;

        let stuck = h.fetch("slow").await;
        assert_eq!(stuck.status.phase, JobPhase::Pending);
        assert!(stuck.status.error.is_none());
        assert!(stuck.status.backend_job_id.is_none());
        assert_eq!(h.backend.submitted().await, 0);
        assert_eq!(backing_off, 1);

        let deadline_failures = h
            .events
            .reasons_for(&job.key())
            .into_iter()
            .filter(|reason| {
                matches!(reason, EventReason::ReconcileFailed { error }
                    if *error == ReconcileError::Cancelled.to_string())
            })
            .count();
        assert!(deadline_failures >= 2, "expected repeated retries, got {deadline_failures}");
    }

    #[tokio::test]
    async fn lagging_notifications_trigger_a_resync() {
        let store = InMemoryJobStore::new().with_notify_capacity(2);
        let h = Harness::with_store(
            store,
            InMemoryExecutionClient::new(),
            SimulatedBackend::new(0),
            fast_config(),
        );
        let handle = Controller::new(h.ctx.clone(), Arc::new(HandlerRegistry::standard()))
            .start()
            .await
            .unwrap();

        // The feeder has not run yet; the burst overflows its two-slot buffer.
        let names: Vec<String> = (0..10).map(|i| format!("burst-{i}")).collect();
        for name in &names {
            h.submit(name, AerJobSpec::new("UVBZ")).await;
        }

        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let jobs = settled(&h, &names).await;
        handle.shutdown_and_join().await;

        assert!(jobs.iter().all(|job| job.status.phase == JobPhase::Completed));
        assert_eq!(h.backend.submitted().await, 10);
    }

    #[tokio::test]
    async fn enormous_job_timeout_does_not_stall_the_worker() {
        let config = ControllerConfig {
            workers: 1,
            ..fast_config()
        };
        let h = Harness::with(InMemoryExecutionClient::new(), SimulatedBackend::new(1), config);
        h.submit("forever", AerJobSpec::new("UVBZ").with_timeout(i64::MAX)).await;
        h.submit("normal", AerJobSpec::new("UVBZ").with_timeout(60)).await;

        let handle = Controller::new(h.ctx.clone(), Arc::new(HandlerRegistry::standard()))
            .start()
            .await
            .unwrap();
        let jobs = settled(&h, &["forever", "normal"]).await;
        handle.shutdown_and_join().await;

        assert_eq!(jobs[0].status.phase, JobPhase::Completed);
        assert_eq!(jobs[1].status.phase, JobPhase::Completed);
    }

    #[tokio::test]
    async fn shutdown_returns_with_idle_workers() {
        let h = Harness::with(InMemoryExecutionClient::new(), SimulatedBackend::new(0), fast_config());
        let handle = Controller::new(h.ctx.clone(), Arc::new(HandlerRegistry::standard()))
            .start()
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown_and_join())
            .await
            .expect("controller shut down");
    }
}
