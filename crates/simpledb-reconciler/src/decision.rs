//! Drift detection: which workload write, if any, this pass needs.

use simpledb_state::{SimpleDb, Workload};

use crate::builder::desired_workload;

/// The workload write a reconciliation pass should issue.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// No workload exists yet; create this one.
    Create(Workload),
    /// The workload's replica count has drifted; write this corrected copy.
    UpdateReplicas(Workload),
    /// Replica counts match.
    NoAction,
}

impl Action {
    /// Whether this action writes to the workload backend.
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::NoAction)
    }
}

/// Compare a `SimpleDb` against its current workload.
///
/// Only the replica count is treated as drift. A missing workload always
/// yields `Create`, whatever the replica numbers say.
pub fn decide(db: &SimpleDb, current: Option<&Workload>) -> Action {
    let Some(current) = current else {
        return Action::Create(desired_workload(db));
    };

    if current.spec.replicas != db.spec.replicas {
        let mut corrected = current.clone();
        corrected.spec.replicas = db.spec.replicas;
        return Action::UpdateReplicas(corrected);
    }

    Action::NoAction
}

#[cfg(test)]
mod tests {
    use super::*;
    use simpledb_state::SimpleDbSpec;

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

    #[test]
    fn missing_workload_is_created() {
        let action = decide(&db(3), None);
        let Action::Create(workload) = action else {
            panic!("expected Create, got {action:?}");
        };
        assert_eq!(workload.spec.replicas, 3);
        assert_eq!(workload.spec.container.image, "postgres:14");
    }

    #[test]
    fn replica_mismatch_updates_only_replicas() {
        let mut current = desired_workload(&db(1));
        current.spec.container.image = "postgres:13".to_string();

        let action = decide(&db(3), Some(&current));
        let Action::UpdateReplicas(workload) = action else {
            panic!("expected UpdateReplicas, got {action:?}");
        };
        assert_eq!(workload.spec.replicas, 3);
        // Image drift is outside the correction policy.
        assert_eq!(workload.spec.container.image, "postgres:13");
    }

    #[test]
    fn matching_replicas_is_no_action() {
        let current = desired_workload(&db(3));
        assert_eq!(decide(&db(3), Some(&current)), Action::NoAction);
        assert!(!Action::NoAction.mutates());
    }

    #[test]
    fn create_wins_for_every_replica_count() {
        for replicas in 1..=5 {
            assert!(matches!(decide(&db(replicas), None), Action::Create(_)));
        }
    }
}
