//! Rollout simulator: stands in for the node agents that bring replicas up.
//!
//! Each tick moves every workload's observed counters toward its declared
//! replica count, `step` replicas at a time, in rollout order:
//! updated follows the spec, ready follows updated, available follows ready.
//! Owners of workloads whose counters moved are reported through the
//! optional change callback so the controller picks up the new counters.

use std::sync::Arc;
use std::time::Duration;

use simpledb_state::{ObjectKey, StateResult, StateStore, Workload, WorkloadStatus};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Callback invoked with the owner of a workload whose counters changed.
pub type ChangeCallback = Arc<dyn Fn(ObjectKey) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

pub struct RolloutSimulator {
    store: StateStore,
    step: i32,
    on_change: Option<ChangeCallback>,
}

impl RolloutSimulator {
    pub fn new(store: StateStore, step: i32) -> Self {
        Self {
            store,
            step: step.max(1),
            on_change: None,
        }
    }

    pub fn with_callback(mut self, callback: ChangeCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    /// Advance every workload by one step. Returns the owners that changed.
    pub async fn tick(&self) -> StateResult<Vec<ObjectKey>> {
        let mut changed = Vec::new();
        for workload in self.store.list_workloads()? {
            let next = advance(&workload, self.step);
            if next == workload.status {
                continue;
            }
            self.store.update_workload_status(&workload.table_key(), next)?;
            debug!(
                key = %workload.key(),
                updated = next.updated_replicas,
                ready = next.ready_replicas,
                available = next.available_replicas,
                "workload counters advanced"
            );

            let owner = workload
                .owner
                .as_ref()
                .map(|o| ObjectKey::new(&o.namespace, &o.name))
                .unwrap_or_else(|| workload.key());
            if let Some(ref cb) = self.on_change {
                cb(owner.clone()).await;
            }
            changed.push(owner);
        }
        Ok(changed)
    }

    /// Tick every `interval` until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(?interval, step = self.step, "rollout simulator started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "rollout tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("rollout simulator shutting down");
                    break;
                }
            }
        }
    }
}

/// Counters after one rollout step.
fn advance(workload: &Workload, step: i32) -> WorkloadStatus {
    let current = workload.status;
    let updated = approach(current.updated_replicas, workload.spec.replicas, step);
    let ready = approach(current.ready_replicas, updated, step);
    let available = approach(current.available_replicas, ready, step);
    WorkloadStatus {
        updated_replicas: updated,
        ready_replicas: ready,
        available_replicas: available,
    }
}

fn approach(current: i32, target: i32, step: i32) -> i32 {
    if current < target {
        current.saturating_add(step).min(target)
    } else {
        current.saturating_sub(step).max(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use simpledb_state::{ContainerSpec, OwnerReference, SIMPLEDB_KIND, WorkloadSpec};

    fn workload(replicas: i32) -> Workload {
        Workload {
            namespace: "default".to_string(),
            name: "orders".to_string(),
            labels: Default::default(),
            owner: Some(OwnerReference {
                kind: SIMPLEDB_KIND.to_string(),
                namespace: "default".to_string(),
                name: "orders".to_string(),
                controller: true,
            }),
            spec: WorkloadSpec {
                replicas,
                selector: Default::default(),
                container: ContainerSpec {
                    name: "simpledb".to_string(),
                    image: "postgres:14".to_string(),
                    ports: vec![],
                    env: vec![],
                },
            },
            status: WorkloadStatus::default(),
        }
    }

    #[test]
    fn approach_moves_by_step_without_overshoot() {
        assert_eq!(approach(0, 5, 2), 2);
        assert_eq!(approach(4, 5, 2), 5);
        assert_eq!(approach(5, 5, 2), 5);
        assert_eq!(approach(5, 1, 3), 2);
        assert_eq!(approach(2, 1, 3), 1);
    }

    #[test]
    fn counters_follow_rollout_order() {
        let mut w = workload(2);
        let mut history = Vec::new();
        for _ in 0..4 {
            w.status = advance(&w, 1);
            history.push(w.status);
        }
        let (u, r, a) = (
            history[0].updated_replicas,
            history[0].ready_replicas,
            history[0].available_replicas,
        );
        assert_eq!((u, r, a), (1, 1, 1));
        assert_eq!(history[1].updated_replicas, 2);
        assert!(history.iter().all(|s| s.ready_replicas <= s.updated_replicas));
        assert!(history.iter().all(|s| s.available_replicas <= s.ready_replicas));
        assert_eq!(history[3], WorkloadStatus {
            updated_replicas: 2,
            ready_replicas: 2,
            available_replicas: 2,
        });
    }

    #[tokio::test]
    async fn tick_settles_and_reports_owner() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_workload(&workload(3)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let cb: ChangeCallback = {
            let seen = seen.clone();
            Arc::new(move |key| -> BoxFuture {
                seen.lock().unwrap().push(key);
                Box::pin(async {})
            })
        };
        let sim = RolloutSimulator::new(store.clone(), 3).with_callback(cb);

        let changed = sim.tick().await.unwrap();
        assert_eq!(changed, vec![ObjectKey::new("default", "orders")]);
        let status = store.get_workload("default/orders").unwrap().unwrap().status;
        assert_eq!(status.available_replicas, 3);

        // Settled: nothing more to report.
        assert!(sim.tick().await.unwrap().is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scale_down_lowers_counters() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_workload(&workload(3)).unwrap();
        let sim = RolloutSimulator::new(store.clone(), 5);
        sim.tick().await.unwrap();

        store.update_workload(&workload(1)).unwrap();
        sim.tick().await.unwrap();
        let status = store.get_workload("default/orders").unwrap().unwrap().status;
        assert_eq!(status.ready_replicas, 1);
        assert_eq!(status.available_replicas, 1);
    }
}
