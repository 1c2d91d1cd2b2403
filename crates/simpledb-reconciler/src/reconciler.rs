//! Reconciler: one pass of the control loop for one SimpleDB.
//!
//! `plan()` is the pure decision; `Reconciler::reconcile()` wraps it with
//! the reads that feed it and the single write it calls for.

use std::time::{SystemTime, UNIX_EPOCH};

use simpledb_state::{ObjectKey, SimpleDb, Workload};
use tracing::{debug, error, info};

use crate::backend::ClusterBackend;
use crate::decision::{Action, decide};
use crate::error::{ObjectKind, ReconcileError, ReconcileResult, WriteOp};
use crate::outcome::Outcome;
use crate::readiness::{READY_CONDITION, is_ready, ready_condition};
use crate::status::{StatusUpdate, diff_status};

/// Everything a pass decided, before any write is issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub action: Action,
    /// Always `Unchanged` when `action` mutates the workload: readiness is
    /// not evaluated against counters that are about to go stale.
    pub status: StatusUpdate,
}

impl Plan {
    /// The outcome this plan yields once its write (if any) succeeds.
    pub fn outcome(&self) -> Outcome {
        if self.action.mutates() {
            return Outcome::Requeue;
        }
        Outcome::Done {
            status_written: matches!(self.status, StatusUpdate::Write(_)),
        }
    }
}

/// Decide the step for one pass. Pure: `now` stamps any new condition.
pub fn plan(db: &SimpleDb, current: Option<&Workload>, now: u64) -> ReconcileResult<Plan> {
    if db.spec.replicas < 1 {
        return Err(ReconcileError::InvariantViolation(format!(
            "{} declares {} replicas, at least 1 required",
            db.key(),
            db.spec.replicas
        )));
    }

    let action = decide(db, current);
    let status = match (&action, current) {
        (Action::NoAction, Some(workload)) => {
            let computed = ready_condition(is_ready(workload), now);
            diff_status(&db.status.conditions, computed)?
        }
        _ => StatusUpdate::Unchanged,
    };

    Ok(Plan { action, status })
}

/// Runs reconciliation passes against a backend.
pub struct Reconciler<B> {
    backend: B,
    clock: fn() -> u64,
}

impl<B: ClusterBackend> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            clock: epoch_secs,
        }
    }

    /// Replace the clock used to stamp condition transitions (for testing).
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reconcile the SimpleDB at `key`.
    ///
    /// Reads fresh state, issues at most one write, and never retries.
    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<Outcome> {
        let db = self
            .backend
            .get_simpledb(key)
            .await
            .map_err(|source| ReconcileError::Fetch {
                kind: ObjectKind::SimpleDb,
                key: key.clone(),
                source,
            })?;
        let Some(db) = db else {
            debug!(%key, "simpledb not found, nothing to reconcile");
            return Ok(Outcome::done());
        };

        let workload = self
            .backend
            .get_workload(key)
            .await
            .map_err(|source| ReconcileError::Fetch {
                kind: ObjectKind::Workload,
                key: key.clone(),
                source,
            })?;

        let plan = plan(&db, workload.as_ref(), (self.clock)()).inspect_err(|e| {
            error!(%key, error = %e, "refusing to reconcile");
        })?;
        let outcome = plan.outcome();

        match plan.action {
            Action::Create(desired) => {
                info!(%key, replicas = desired.spec.replicas, image = %desired.spec.container.image, "creating workload");
                self.backend
                    .create_workload(&desired)
                    .await
                    .map_err(|source| write_failed(WriteOp::CreateWorkload, key, source))?;
            }
            Action::UpdateReplicas(corrected) => {
                let from = workload.as_ref().map(|w| w.spec.replicas).unwrap_or_default();
                info!(%key, from, to = corrected.spec.replicas, "scaling workload");
                self.backend
                    .update_workload(&corrected)
                    .await
                    .map_err(|source| write_failed(WriteOp::UpdateWorkload, key, source))?;
            }
            Action::NoAction => match plan.status {
                StatusUpdate::Unchanged => {
                    debug!(%key, "status up to date");
                }
                StatusUpdate::Write(conditions) => {
                    if let Some(ready) = conditions.iter().find(|c| c.type_ == READY_CONDITION) {
                        info!(%key, status = ?ready.status, reason = %ready.reason, "updating ready condition");
                    }
                    self.backend
                        .write_status(key, conditions)
                        .await
                        .map_err(|source| write_failed(WriteOp::WriteStatus, key, source))
                        .inspect_err(|e| error!(%key, error = %e, "failed to update simpledb status"))?;
                }
            },
        }

        Ok(outcome)
    }
}

fn write_failed(op: WriteOp, key: &ObjectKey, source: crate::error::BackendError) -> ReconcileError {
    ReconcileError::BackendWrite {
        op,
        key: key.clone(),
        source,
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::desired_workload;
    use crate::readiness::{REASON_AVAILABLE, REASON_CREATING};
    use simpledb_state::{ConditionStatus, SimpleDbSpec, WorkloadStatus};

    fn db(replicas: i32) -> SimpleDb {
        SimpleDb::new(
            "default",
            "orders",
            SimpleDbSpec {
                replicas,
                image: "postgres:14".to_string(),
                db_name: "orders".to_string(),
            },
        )
    }

    fn rolled_out(db: &SimpleDb) -> Workload {
        let mut w = desired_workload(db);
        let n = db.spec.replicas;
        w.status = WorkloadStatus {
            updated_replicas: n,
            ready_replicas: n,
            available_replicas: n,
        };
        w
    }

    #[test]
    fn scenario_a_create_and_requeue() {
        let plan = plan(&db(3), None, 100).unwrap();
        let Action::Create(ref w) = plan.action else {
            panic!("expected Create, got {:?}", plan.action);
        };
        assert_eq!(w.spec.replicas, 3);
        assert_eq!(w.spec.container.image, "postgres:14");
        assert_eq!(plan.status, StatusUpdate::Unchanged);
        assert_eq!(plan.outcome(), Outcome::Requeue);
    }

    #[test]
    fn scenario_b_update_replicas_and_requeue() {
        let current = rolled_out(&db(1));
        let plan = plan(&db(3), Some(&current), 100).unwrap();
        let Action::UpdateReplicas(ref w) = plan.action else {
            panic!("expected UpdateReplicas, got {:?}", plan.action);
        };
        assert_eq!(w.spec.replicas, 3);
        // Readiness is skipped on a mutating pass.
        assert_eq!(plan.status, StatusUpdate::Unchanged);
        assert_eq!(plan.outcome(), Outcome::Requeue);
    }

    #[test]
    fn scenario_c_ready_condition_upserted() {
        let db = db(3);
        let plan = plan(&db, Some(&rolled_out(&db)), 100).unwrap();
        assert_eq!(plan.action, Action::NoAction);
        let StatusUpdate::Write(ref conditions) = plan.status else {
            panic!("expected a status write");
        };
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].reason, REASON_AVAILABLE);
        assert_eq!(conditions[0].last_transition_time, 100);
        assert_eq!(plan.outcome(), Outcome::Done { status_written: true });
    }

    #[test]
    fn scenario_d_identical_condition_suppressed() {
        let mut db = db(3);
        db.status.conditions = vec![ready_condition(true, 50)];
        let plan = plan(&db, Some(&rolled_out(&db)), 100).unwrap();
        assert_eq!(plan.action, Action::NoAction);
        assert_eq!(plan.status, StatusUpdate::Unchanged);
        assert_eq!(plan.outcome(), Outcome::Done { status_written: false });
    }

    #[test]
    fn lagging_counters_report_creating() {
        let db = db(3);
        let mut current = rolled_out(&db);
        current.status.ready_replicas = 1;
        let plan = plan(&db, Some(&current), 100).unwrap();
        let StatusUpdate::Write(ref conditions) = plan.status else {
            panic!("expected a status write");
        };
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, REASON_CREATING);
    }

    #[test]
    fn transition_time_moves_only_with_status_or_reason() {
        let mut db = db(3);
        let ready = rolled_out(&db);
        let mut lagging = ready.clone();
        lagging.status.available_replicas = 0;

        // Creating at t=10.
        let StatusUpdate::Write(c) = plan(&db, Some(&lagging), 10).unwrap().status else {
            panic!("expected a status write");
        };
        db.status.conditions = c;

        // Still creating at t=20: no write, timestamp stays 10.
        assert_eq!(plan(&db, Some(&lagging), 20).unwrap().status, StatusUpdate::Unchanged);

        // Message edited out-of-band: still no write.
        db.status.conditions[0].message = "edited".to_string();
        assert_eq!(plan(&db, Some(&lagging), 25).unwrap().status, StatusUpdate::Unchanged);
        assert_eq!(db.status.conditions[0].last_transition_time, 10);

        // Ready at t=30.
        let StatusUpdate::Write(c) = plan(&db, Some(&ready), 30).unwrap().status else {
            panic!("expected a status write");
        };
        assert_eq!(c[0].last_transition_time, 30);
    }

    #[test]
    fn zero_replicas_rejected_by_plan() {
        let result = plan(&db(0), None, 100);
        assert!(matches!(result, Err(ReconcileError::InvariantViolation(_))));
    }

    #[test]
    fn duplicate_conditions_fail_the_pass() {
        let mut db = db(3);
        db.status.conditions = vec![ready_condition(true, 1), ready_condition(false, 2)];
        let result = plan(&db, Some(&rolled_out(&db)), 100);
        assert!(matches!(result, Err(ReconcileError::InvariantViolation(_))));
    }

    #[test]
    fn epoch_secs_returns_reasonable_value() {
        // Should be after 2024-01-01.
        assert!(epoch_secs() > 1_704_067_200);
    }
}
