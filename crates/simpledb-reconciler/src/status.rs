//! Status-diff suppression.
//!
//! A status write re-triggers the watch on the SimpleDB, so a write that
//! carries no semantic change would keep the loop spinning. A write happens
//! only when the status or reason of a condition actually moves.

use std::collections::HashSet;

use simpledb_state::Condition;

use crate::error::{ReconcileError, ReconcileResult};

/// Whether a pass must persist new conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// Stored status already says the same thing.
    Unchanged,
    /// Persist this full condition list.
    Write(Vec<Condition>),
}

/// Decide whether `computed` needs to be written over `stored`.
///
/// Message-only differences are suppressed. When a write is needed the
/// condition is upserted by type, keeping every other condition and its
/// position; `computed.last_transition_time` becomes the stored timestamp.
pub fn diff_status(stored: &[Condition], computed: Condition) -> ReconcileResult<StatusUpdate> {
    ensure_unique_types(stored)?;

    if let Some(existing) = stored.iter().find(|c| c.type_ == computed.type_)
        && existing.status == computed.status
        && existing.reason == computed.reason
    {
        return Ok(StatusUpdate::Unchanged);
    }

    let mut conditions = stored.to_vec();
    match conditions.iter_mut().find(|c| c.type_ == computed.type_) {
        Some(slot) => *slot = computed,
        None => conditions.push(computed),
    }
    Ok(StatusUpdate::Write(conditions))
}

fn ensure_unique_types(conditions: &[Condition]) -> ReconcileResult<()> {
    let mut seen = HashSet::new();
    for c in conditions {
        if !seen.insert(c.type_.as_str()) {
            return Err(ReconcileError::InvariantViolation(format!(
                "duplicate condition type {:?} in stored status",
                c.type_
            )));
        }
    }
    Ok(())
}
