//! Control signal returned to the driver after each pass.

use std::time::Duration;

/// How the driver should treat an identity after a successful pass.
///
/// A failed pass is an `Err(ReconcileError)`; the driver applies its own
/// backoff to those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the next change.
    Done {
        /// Whether this pass persisted new status conditions.
        status_written: bool,
    },
    /// State changed; run again right away.
    Requeue,
    /// Run again after the given delay.
    RequeueAfter(Duration),
}

impl Outcome {
    pub fn done() -> Self {
        Self::Done {
            status_written: false,
        }
    }

    pub fn status_written(&self) -> bool {
        matches!(self, Self::Done { status_written: true })
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done { .. } => "done",
            Self::Requeue => "requeue",
            Self::RequeueAfter(_) => "requeue_after",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Outcome::done().label(), "done");
        assert_eq!(Outcome::Requeue.label(), "requeue");
        assert_eq!(Outcome::RequeueAfter(Duration::from_secs(1)).label(), "requeue_after");
    }

    #[test]
    fn status_written_only_for_done_with_write() {
        assert!(Outcome::Done { status_written: true }.status_written());
        assert!(!Outcome::done().status_written());
        assert!(!Outcome::Requeue.status_written());
    }
}
