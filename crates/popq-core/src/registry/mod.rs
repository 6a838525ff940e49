mod waiter;
pub(crate) use waiter::{Waiter, WaiterOutcome};

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use tokio::sync::OwnedMutexGuard;
use tracing::trace;
use uuid::Uuid;

use popq_model::{Key, WaiterInfo};

/// FIFO queue of pending waiters for one key.
///
/// The mutex doubles as the key's serialization domain: list access through
/// the store adapter, claim passes and queue edits for a key all run with
/// this lock held, so "check length, then pop" and "check length, then
/// register" are each atomic with respect to concurrent pushes.
pub(crate) type KeyQueue = tokio::sync::Mutex<VecDeque<Waiter>>;

/// Per-key waiter queues; the single source of truth for who is waiting
/// and in what order.
///
/// Entries are created on first use and pruned once their queue empties.
/// Pruning races against registration, so every acquisition re-checks that
/// the locked queue is still the one the map points to.
#[derive(Clone, Default)]
pub struct WaitRegistry {
    keys: Arc<Mutex<HashMap<Key, Arc<KeyQueue>>>>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the queue for `key`, creating it if absent.
    ///
    /// The returned guard is valid: if the entry was pruned between the map
    /// lookup and the queue lock, the acquisition is retried against the
    /// current entry.
    pub(crate) async fn lock_key(
        &self,
        key: &str,
    ) -> (Arc<KeyQueue>, OwnedMutexGuard<VecDeque<Waiter>>) {
        loop {
            let queue = {
                let mut keys = self.keys.lock().unwrap();
                Arc::clone(keys.entry(key.to_string()).or_default())
            };
            let guard = Arc::clone(&queue).lock_owned().await;

            let current = {
                let keys = self.keys.lock().unwrap();
                keys.get(key).is_some_and(|q| Arc::ptr_eq(q, &queue))
            };
            if current {
                return (queue, guard);
            }
            // Lost a race with pruning; the map entry was replaced.
        }
    }

    /// Drop the map entry for `key` if its queue is empty.
    ///
    /// Must be called with the queue's guard held so no waiter can slip in
    /// between the emptiness check and the removal.
    pub(crate) fn prune(
        &self,
        key: &str,
        queue: &Arc<KeyQueue>,
        guard: &OwnedMutexGuard<VecDeque<Waiter>>,
    ) {
        if !guard.is_empty() {
            return;
        }
        let mut keys = self.keys.lock().unwrap();
        if keys.get(key).is_some_and(|q| Arc::ptr_eq(q, queue)) {
            keys.remove(key);
            trace!(key, "empty waiter queue pruned");
        }
    }

    /// Remove the waiter `id` from `key`'s queue, if it is still pending.
    ///
    /// Whoever takes the waiter owns its terminal transition; a second
    /// taker (or a stale timer entry) gets `None` and must do nothing.
    pub(crate) async fn take(&self, key: &str, id: Uuid) -> Option<Waiter> {
        let (queue, mut guard) = self.lock_key(key).await;
        let pos = guard.iter().position(|w| w.id == id);
        let taken = pos.and_then(|pos| guard.remove(pos));
        self.prune(key, &queue, &guard);
        taken
    }

    /// Snapshot of the pending waiters for `key`, in registration order.
    pub async fn waiters(&self, key: &str) -> Vec<WaiterInfo> {
        let queue = {
            let keys = self.keys.lock().unwrap();
            keys.get(key).cloned()
        };
        match queue {
            None => Vec::new(),
            Some(q) => q.lock().await.iter().map(|w| w.info(key)).collect(),
        }
    }

    /// Number of pending waiters for `key`.
    pub async fn waiter_count(&self, key: &str) -> usize {
        let queue = {
            let keys = self.keys.lock().unwrap();
            keys.get(key).cloned()
        };
        match queue {
            None => 0,
            Some(q) => q.lock().await.len(),
        }
    }

    /// Number of keys with a live queue entry. Pruning keeps this at zero
    /// when nothing is blocked.
    pub fn key_count(&self) -> usize {
        let keys = self.keys.lock().unwrap();
        keys.len()
    }
}
