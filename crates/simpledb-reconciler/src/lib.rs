//! simpledb-reconciler: the decision core of the SimpleDB operator.
//!
//! Given a `SimpleDb` and the current state of its `Workload` (if any), the
//! reconciler computes the single corrective step for this pass and the
//! readiness condition to report:
//!
//! ```text
//! plan(SimpleDb, Option<Workload>, now)
//!   ├── no workload            → Create(desired_workload)       → Requeue
//!   ├── replicas differ        → UpdateReplicas(workload)       → Requeue
//!   └── replicas match         → NoAction
//!         ├── Ready condition unchanged (status + reason) → Done, no write
//!         └── otherwise upsert Ready condition            → Done, status written
//! ```
//!
//! Everything in `builder`, `decision`, `readiness` and `status` is pure.
//! `Reconciler` performs the reads, issues at most one write per pass
//! through a `ClusterBackend`, and hands an `Outcome` back to the driver.
//! Queueing, retries and backoff belong to the driver, never to this crate.

pub mod backend;
pub mod builder;
pub mod decision;
pub mod error;
pub mod outcome;
pub mod readiness;
pub mod reconciler;
pub mod status;

pub use backend::ClusterBackend;
pub use builder::desired_workload;
pub use decision::{Action, decide};
pub use error::{BackendError, ObjectKind, ReconcileError, ReconcileResult, WriteOp};
pub use outcome::Outcome;
pub use readiness::{is_ready, ready_condition};
pub use reconciler::{Plan, Reconciler, plan};
pub use status::{StatusUpdate, diff_status};
