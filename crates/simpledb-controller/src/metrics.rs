//! Reconcile counters and their Prometheus text exposition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use simpledb_reconciler::{Outcome, ReconcileError};

/// Lock-free counters updated by controller workers.
#[derive(Default)]
pub struct ControllerMetrics {
    done: AtomicU64,
    requeue: AtomicU64,
    requeue_after: AtomicU64,
    fetch_errors: AtomicU64,
    write_errors: AtomicU64,
    invariant_errors: AtomicU64,
    status_writes: AtomicU64,
    duration_micros: AtomicU64,
    passes: AtomicU64,
}

/// Point-in-time copy of `ControllerMetrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub done: u64,
    pub requeue: u64,
    pub requeue_after: u64,
    pub fetch_errors: u64,
    pub write_errors: u64,
    pub invariant_errors: u64,
    pub status_writes: u64,
    pub duration_micros: u64,
    pub passes: u64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one pass.
    pub fn observe(&self, result: &Result<Outcome, ReconcileError>, elapsed: Duration) {
        let counter = match result {
            Ok(outcome @ Outcome::Done { .. }) => {
                if outcome.status_written() {
                    self.status_writes.fetch_add(1, Ordering::Relaxed);
                }
                &self.done
            }
            Ok(Outcome::Requeue) => &self.requeue,
            Ok(Outcome::RequeueAfter(_)) => &self.requeue_after,
            Err(ReconcileError::Fetch { .. }) => &self.fetch_errors,
            Err(ReconcileError::BackendWrite { .. }) => &self.write_errors,
            Err(ReconcileError::InvariantViolation(_)) => &self.invariant_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.passes.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.duration_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            done: self.done.load(Ordering::Relaxed),
            requeue: self.requeue.load(Ordering::Relaxed),
            requeue_after: self.requeue_after.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            invariant_errors: self.invariant_errors.load(Ordering::Relaxed),
            status_writes: self.status_writes.load(Ordering::Relaxed),
            duration_micros: self.duration_micros.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
        }
    }
}

/// Render a snapshot in the Prometheus text exposition format.
pub fn render_prometheus(snapshot: &MetricsSnapshot, queue_depth: usize) -> String {
    let mut out = String::new();

    out.push_str("# HELP simpledb_reconcile_total Reconciliation passes by result.\n");
    out.push_str("# TYPE simpledb_reconcile_total counter\n");
    for (result, value) in [
        ("done", snapshot.done),
        ("requeue", snapshot.requeue),
        ("requeue_after", snapshot.requeue_after),
        ("error", snapshot.fetch_errors + snapshot.write_errors + snapshot.invariant_errors),
    ] {
        out.push_str(&format!(
            "simpledb_reconcile_total{{result=\"{result}\"}} {value}\n"
        ));
    }

    out.push_str("# HELP simpledb_reconcile_errors_total Failed passes by error kind.\n");
    out.push_str("# TYPE simpledb_reconcile_errors_total counter\n");
    for (kind, value) in [
        ("fetch", snapshot.fetch_errors),
        ("backend_write", snapshot.write_errors),
        ("invariant", snapshot.invariant_errors),
    ] {
        out.push_str(&format!(
            "simpledb_reconcile_errors_total{{kind=\"{kind}\"}} {value}\n"
        ));
    }

    out.push_str("# HELP simpledb_status_writes_total Status condition writes.\n");
    out.push_str("# TYPE simpledb_status_writes_total counter\n");
    out.push_str(&format!("simpledb_status_writes_total {}\n", snapshot.status_writes));

    out.push_str("# HELP simpledb_reconcile_duration_seconds Time spent in reconciliation passes.\n");
    out.push_str("# TYPE simpledb_reconcile_duration_seconds summary\n");
    out.push_str(&format!(
        "simpledb_reconcile_duration_seconds_sum {:.6}\n",
        snapshot.duration_micros as f64 / 1_000_000.0
    ));
    out.push_str(&format!(
        "simpledb_reconcile_duration_seconds_count {}\n",
        snapshot.passes
    ));

    out.push_str("# HELP simpledb_workqueue_depth Identities waiting for a worker.\n");
    out.push_str("# TYPE simpledb_workqueue_depth gauge\n");
    out.push_str(&format!("simpledb_workqueue_depth {queue_depth}\n"));

    out
}
