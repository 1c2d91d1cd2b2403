//! Readiness evaluation over a workload's observed counters.

use simpledb_state::{Condition, ConditionStatus, Workload};

pub const READY_CONDITION: &str = "Ready";
pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_CREATING: &str = "Creating";

/// A workload is ready when every counter has reached its replica count.
pub fn is_ready(workload: &Workload) -> bool {
    let desired = workload.spec.replicas;
    let observed = &workload.status;
    observed.updated_replicas == desired
        && observed.ready_replicas == desired
        && observed.available_replicas == desired
}

/// The `Ready` condition for a readiness verdict, stamped with `now`.
pub fn ready_condition(ready: bool, now: u64) -> Condition {
    let (status, reason, message) = if ready {
        (ConditionStatus::True, REASON_AVAILABLE, "Database is ready")
    } else {
        (ConditionStatus::False, REASON_CREATING, "Database is being created")
    };

    Condition {
        type_: READY_CONDITION.to_string(),
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: now,
    }
}
