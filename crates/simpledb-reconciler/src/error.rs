//! Reconciliation error types.

use std::fmt;

use simpledb_state::{ObjectKey, StateError};
use thiserror::Error;

/// Errors surfaced by a `ClusterBackend` implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// The kind of record a failed read was after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    SimpleDb,
    Workload,
}

/// The backend write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    CreateWorkload,
    UpdateWorkload,
    WriteStatus,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimpleDb => f.write_str("simpledb"),
            Self::Workload => f.write_str("workload"),
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateWorkload => f.write_str("create workload"),
            Self::UpdateWorkload => f.write_str("update workload"),
            Self::WriteStatus => f.write_str("write status"),
        }
    }
}

/// Errors that end a reconciliation pass.
///
/// Absence of a record is not an error: a missing SimpleDB ends the pass,
/// a missing workload leads to its creation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to read {kind} {key}: {source}")]
    Fetch {
        kind: ObjectKind,
        key: ObjectKey,
        #[source]
        source: BackendError,
    },

    #[error("failed to {op} for {key}: {source}")]
    BackendWrite {
        op: WriteOp,
        key: ObjectKey,
        #[source]
        source: BackendError,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl ReconcileError {
    /// The failed write, if this error came from one.
    pub fn write_op(&self) -> Option<WriteOp> {
        match self {
            Self::BackendWrite { op, .. } => Some(*op),
            _ => None,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
