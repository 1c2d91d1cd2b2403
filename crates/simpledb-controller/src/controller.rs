//! Controller: worker pool and resync ticker driving reconciliation passes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use simpledb_reconciler::{ClusterBackend, Outcome, ReconcileResult, Reconciler};
use simpledb_state::ObjectKey;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::metrics::{ControllerMetrics, render_prometheus};
use crate::queue::WorkQueue;

/// Tuning for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Concurrent passes (distinct identities only).
    pub workers: usize,
    /// How often every known SimpleDB is re-enqueued.
    pub resync_interval: Duration,
    pub backoff: Backoff,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            resync_interval: Duration::from_secs(30),
            backoff: Backoff::default(),
        }
    }
}

/// Cloneable way to request a pass for an identity.
#[derive(Clone)]
pub struct ControllerHandle {
    queue: WorkQueue,
    metrics: Arc<ControllerMetrics>,
}

impl ControllerHandle {
    pub async fn enqueue(&self, key: ObjectKey) {
        debug!(%key, "enqueued");
        self.queue.add(key).await;
    }

    /// Prometheus exposition of the controller's counters.
    pub async fn render_metrics(&self) -> String {
        render_prometheus(&self.metrics.snapshot(), self.queue.len().await)
    }
}

/// Drives a `Reconciler` from a shared work queue.
pub struct Controller<B> {
    reconciler: Reconciler<B>,
    queue: WorkQueue,
    config: ControllerConfig,
    metrics: Arc<ControllerMetrics>,
}

impl<B: ClusterBackend + 'static> Controller<B> {
    pub fn new(reconciler: Reconciler<B>, config: ControllerConfig) -> Self {
        Self {
            reconciler,
            queue: WorkQueue::new(config.backoff),
            config,
            metrics: Arc::new(ControllerMetrics::new()),
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            queue: self.queue.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn metrics(&self) -> Arc<ControllerMetrics> {
        self.metrics.clone()
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Run one pass for an identity handed out by the queue and settle its
    /// queue bookkeeping from the result.
    pub async fn process(&self, key: ObjectKey) -> ReconcileResult<Outcome> {
        let started = Instant::now();
        let result = self.reconciler.reconcile(&key).await;
        self.metrics.observe(&result, started.elapsed());

        match &result {
            Ok(Outcome::Done { .. }) => {
                self.queue.forget(&key).await;
            }
            Ok(Outcome::Requeue) => {
                self.queue.forget(&key).await;
                self.queue.add(key.clone()).await;
            }
            Ok(Outcome::RequeueAfter(delay)) => {
                self.queue.forget(&key).await;
                self.queue.add_after(key.clone(), *delay);
            }
            Err(e) => {
                let retry_in = self.queue.add_rate_limited(key.clone()).await;
                warn!(%key, error = %e, ?retry_in, "reconcile failed, backing off");
            }
        }

        self.queue.done(&key).await;
        result
    }

    /// Enqueue every SimpleDB the backend knows about. Returns how many.
    pub async fn resync(&self) -> usize {
        match self.reconciler.backend().list_simpledbs().await {
            Ok(keys) => {
                let count = keys.len();
                for key in keys {
                    self.queue.add(key).await;
                }
                debug!(count, "resync enqueued simpledbs");
                count
            }
            Err(e) => {
                error!(error = %e, "resync failed to list simpledbs");
                0
            }
        }
    }

    /// Run workers and the resync ticker until `shutdown` flips to `true` or
    /// its sender is dropped.
    ///
    /// Passes already in flight finish before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let controller = Arc::new(self);
        let workers = controller.config.workers.max(1);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let controller = controller.clone();
            handles.push(tokio::spawn(async move {
                while let Some(key) = controller.queue.next().await {
                    controller.process(key).await.ok();
                }
                debug!(worker, "worker stopped");
            }));
        }

        info!(
            workers,
            resync_interval = ?controller.config.resync_interval,
            "controller started"
        );

        let period = controller.config.resync_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    controller.resync().await;
                }
                res = shutdown.changed() => {
                    // A dropped sender also ends the loop.
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        controller.queue.shutdown().await;
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "controller worker panicked");
            }
        }
        info!("controller stopped");
    }
}
