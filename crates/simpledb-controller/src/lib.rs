//! simpledb-controller: drives reconciliation passes.
//!
//! ```text
//!   API writes ─┐
//!   rollout  ───┼──► WorkQueue ──► worker × N ──► Reconciler::reconcile
//!   resync   ───┘       ▲                            │
//!                       └──── Requeue / backoff ◄────┘
//! ```
//!
//! The queue deduplicates identities and never hands the same identity to
//! two workers at once. Failed passes come back after an exponential
//! backoff; successful ones reset it.
//!
//! `RolloutSimulator` plays the part of the nodes: it moves workload
//! counters toward their declared replica counts so the loop has something
//! to observe in a standalone deployment.

pub mod backoff;
pub mod controller;
pub mod metrics;
pub mod queue;
pub mod rollout;

pub use backoff::Backoff;
pub use controller::{Controller, ControllerConfig, ControllerHandle};
pub use metrics::{ControllerMetrics, MetricsSnapshot, render_prometheus};
pub use queue::WorkQueue;
pub use rollout::{BoxFuture, ChangeCallback, RolloutSimulator};
