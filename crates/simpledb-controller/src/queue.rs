//! Work queue of SimpleDB identities.
//!
//! Guarantees the driver relies on:
//! - an identity waiting in the queue is never queued twice
//! - an identity is handed to at most one worker at a time; adding it while
//!   a worker holds it defers it until that worker calls `done`
//! - failures are counted per identity and turned into backoff delays

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use simpledb_state::ObjectKey;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::backoff::Backoff;

#[derive(Default)]
struct QueueState {
    /// Identities ready to hand out, in arrival order.
    pending: VecDeque<ObjectKey>,
    /// Identities that want a pass: everything in `pending`, plus any
    /// re-added while a worker holds them.
    queued: HashSet<ObjectKey>,
    /// Identities currently held by a worker.
    active: HashSet<ObjectKey>,
    /// Consecutive failures per identity.
    failures: HashMap<ObjectKey, u32>,
    shut_down: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff: Backoff,
}

/// Cloneable handle to a shared deduplicating queue.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                backoff,
            }),
        }
    }

    /// Queue an identity for a pass.
    pub async fn add(&self, key: ObjectKey) {
        let mut state = self.inner.state.lock().await;
        if state.shut_down || !state.queued.insert(key.clone()) {
            return;
        }
        if state.active.contains(&key) {
            debug!(%key, "in flight, deferring until done");
            return;
        }
        state.pending.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Queue an identity once `delay` has elapsed.
    pub fn add_after(&self, key: ObjectKey, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            queue.add(key).await;
        });
    }

    /// Record a failure and queue the identity after its backoff delay.
    ///
    /// Returns the delay chosen.
    pub async fn add_rate_limited(&self, key: ObjectKey) -> Duration {
        let failures = {
            let mut state = self.inner.state.lock().await;
            let count = state.failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        let delay = self.inner.backoff.delay(failures);
        self.add_after(key, delay);
        delay
    }

    /// Clear the failure count of an identity.
    pub async fn forget(&self, key: &ObjectKey) {
        self.inner.state.lock().await.failures.remove(key);
    }

    /// Consecutive failures recorded for an identity.
    pub async fn failures(&self, key: &ObjectKey) -> u32 {
        self.inner
            .state
            .lock()
            .await
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Wait for the next identity. Returns `None` once the queue is shut down.
    ///
    /// The caller holds the identity until it calls `done`.
    pub async fn next(&self) -> Option<ObjectKey> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock().await;
                if state.shut_down {
                    return None;
                }
                if let Some(key) = state.pending.pop_front() {
                    state.queued.remove(&key);
                    state.active.insert(key.clone());
                    let more = !state.pending.is_empty();
                    drop(state);
                    if more {
                        self.inner.notify.notify_one();
                    }
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Release an identity handed out by `next`.
    pub async fn done(&self, key: &ObjectKey) {
        let mut state = self.inner.state.lock().await;
        state.active.remove(key);
        if state.queued.contains(key) {
            state.pending.push_back(key.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Number of identities waiting to be handed out.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop handing out work; pending `next` calls return `None`.
    pub async fn shutdown(&self) {
        self.inner.state.lock().await.shut_down = true;
        self.inner.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    fn queue() -> WorkQueue {
        WorkQueue::new(Backoff::new(Duration::from_millis(10), Duration::from_millis(40)))
    }

    #[tokio::test]
    async fn preserves_arrival_order() {
        let q = queue();
        q.add(key("a")).await;
        q.add(key("b")).await;
        assert_eq!(q.next().await, Some(key("a")));
        assert_eq!(q.next().await, Some(key("b")));
    }

    #[tokio::test]
    async fn deduplicates_waiting_identities() {
        let q = queue();
        q.add(key("a")).await;
        q.add(key("a")).await;
        q.add(key("a")).await;
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn defers_identity_held_by_a_worker() {
        let q = queue();
        q.add(key("a")).await;
        let held = q.next().await.unwrap();

        // Re-added while in flight: not handed to anyone else yet.
        q.add(key("a")).await;
        assert!(q.is_empty().await);

        q.done(&held).await;
        assert_eq!(q.len().await, 1);
        assert_eq!(q.next().await, Some(key("a")));
    }

    #[tokio::test]
    async fn done_without_readd_drops_identity() {
        let q = queue();
        q.add(key("a")).await;
        let held = q.next().await.unwrap();
        q.done(&held).await;
        assert!(q.is_empty().await);
    }

    #[tokio::test]
    async fn next_waits_for_add() {
        let q = queue();
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.next().await })
        };
        tokio::task::yield_now().await;
        q.add(key("late")).await;
        assert_eq!(waiter.await.unwrap(), Some(key("late")));
    }

    #[tokio::test]
    async fn shutdown_releases_waiters() {
        let q = queue();
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.next().await })
        };
        tokio::task::yield_now().await;
        q.shutdown().await;
        assert_eq!(waiter.await.unwrap(), None);

        q.add(key("a")).await;
        assert!(q.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_adds_back_off() {
        let q = queue();
        assert_eq!(q.add_rate_limited(key("a")).await, Duration::from_millis(10));
        assert_eq!(q.add_rate_limited(key("a")).await, Duration::from_millis(20));
        assert_eq!(q.add_rate_limited(key("a")).await, Duration::from_millis(40));
        assert_eq!(q.add_rate_limited(key("a")).await, Duration::from_millis(40));
        assert_eq!(q.failures(&key("a")).await, 4);

        // Nothing is queued until the first delay passes.
        assert!(q.is_empty().await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(q.len().await, 1);

        q.forget(&key("a")).await;
        assert_eq!(q.failures(&key("a")).await, 0);
    }
}
