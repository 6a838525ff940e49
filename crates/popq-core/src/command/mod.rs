use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use uuid::Uuid;

use popq_model::{ClaimPolicy, Element, Key, WaitTimeout, WaiterInfo};
use popq_store::ListStore;

use crate::{
    error::PopError,
    registry::{WaitRegistry, Waiter, WaiterOutcome},
    resolver::ClaimResolver,
    scheduler::TimeoutScheduler,
};

/// Entry point for the blocking pop commands.
///
/// Owns the waiter registry, the claim resolver and the timeout scheduler,
/// and drives the store adapter. Appends must flow through [`PopEngine::push`]:
/// that is what runs the claim pass which wakes blocked callers.
///
/// Cheap to clone; all clones share state. Construction spawns the
/// scheduler task and therefore requires a tokio runtime.
#[derive(Clone)]
pub struct PopEngine {
    store: Arc<dyn ListStore>,
    registry: WaitRegistry,
    resolver: ClaimResolver,
    timers: Arc<TimeoutScheduler>,
}

impl PopEngine {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        let registry = WaitRegistry::new();
        let resolver = ClaimResolver::new(Arc::clone(&store));
        let timers = Arc::new(TimeoutScheduler::spawn(registry.clone()));
        Self {
            store,
            registry,
            resolver,
            timers,
        }
    }

    /// Pop every element currently in the list at `key`, blocking until at
    /// least one is available.
    ///
    /// Returns elements tail-first. `Ok(None)` means the timeout elapsed
    /// with no data; `timeout_ms == 0` waits indefinitely.
    #[instrument(level = "debug", skip(self, cancel))]
    pub async fn pop_all(
        &self,
        key: &str,
        timeout_ms: i64,
        cancel: CancellationToken,
    ) -> Result<Option<Vec<Element>>, PopError> {
        let timeout = validate_timeout(timeout_ms)?;
        self.block_on_claim(key, ClaimPolicy::All, timeout, cancel)
            .await
    }

    /// Pop up to `count` elements from the list at `key`, blocking until at
    /// least one is available.
    ///
    /// `count` is a ceiling: once any data exists the caller gets whatever
    /// is there, up to `count`, immediately. Same timeout contract as
    /// [`PopEngine::pop_all`].
    #[instrument(level = "debug", skip(self, cancel))]
    pub async fn pop_batch(
        &self,
        key: &str,
        count: i64,
        timeout_ms: i64,
        cancel: CancellationToken,
    ) -> Result<Option<Vec<Element>>, PopError> {
        if count < 1 {
            return Err(PopError::InvalidCount(count));
        }
        let timeout = validate_timeout(timeout_ms)?;
        let policy = ClaimPolicy::Batch {
            count: count as u64,
        };
        self.block_on_claim(key, policy, timeout, cancel).await
    }

    /// Append `values` to the tail of `key` and wake blocked callers.
    ///
    /// Runs a claim pass under the key lock before returning; the result is
    /// the list length after the pass (elements handed to waiters are gone).
    #[instrument(level = "debug", skip(self, values), fields(n = values.len()))]
    pub async fn push(&self, key: &str, values: Vec<Element>) -> Result<usize, PopError> {
        let (queue, mut guard) = self.registry.lock_key(key).await;

        let result = async {
            let len = self.store.push_tail(key, values).await?;
            debug!(key, len, "elements appended");
            self.resolver.run_pass(key, &mut guard).await?;
            self.store.len(key).await
        }
        .await;

        self.registry.prune(key, &queue, &guard);
        Ok(result?)
    }

    /// Non-blocking claim: the immediate path of the pop commands, exposed
    /// directly. `Ok(None)` when the list is empty.
    pub async fn try_pop(
        &self,
        key: &str,
        policy: ClaimPolicy,
    ) -> Result<Option<Vec<Element>>, PopError> {
        let (queue, guard) = self.registry.lock_key(key).await;
        let claimed = self.resolver.try_claim(key, &policy).await;
        self.registry.prune(key, &queue, &guard);
        Ok(claimed?)
    }

    /// Current length of the list at `key` (0 if absent).
    pub async fn len(&self, key: &str) -> Result<usize, PopError> {
        Ok(self.store.len(key).await?)
    }

    /// Snapshot of the callers blocked on `key`, in registration order.
    pub async fn waiters(&self, key: &str) -> Vec<WaiterInfo> {
        self.registry.waiters(key).await
    }

    /// Number of callers blocked on `key`.
    pub async fn waiter_count(&self, key: &str) -> usize {
        self.registry.waiter_count(key).await
    }

    /// Fast path, then suspend: try an immediate claim under the key lock;
    /// failing that, queue a waiter, arm its deadline and await resolution
    /// by the resolver, the scheduler or the cancellation token.
    async fn block_on_claim(
        &self,
        key: &str,
        policy: ClaimPolicy,
        timeout: WaitTimeout,
        cancel: CancellationToken,
    ) -> Result<Option<Vec<Element>>, PopError> {
        let (slot, mut rx) = {
            let (queue, mut guard) = self.registry.lock_key(key).await;

            // Type errors surface here, before anything is queued.
            match self.resolver.try_claim(key, &policy).await {
                Ok(Some(elems)) => {
                    self.registry.prune(key, &queue, &guard);
                    trace!(key, n = elems.len(), "satisfied immediately");
                    return Ok(Some(elems));
                }
                Ok(None) => {}
                Err(e) => {
                    self.registry.prune(key, &queue, &guard);
                    return Err(e.into());
                }
            }

            let deadline = timeout.as_duration().map(|d| Instant::now() + d);
            let (waiter, rx) = Waiter::new(policy, deadline);
            let id = waiter.id;
            guard.push_back(waiter);
            if let Some(at) = deadline {
                self.timers.arm(key, id, at);
            }
            debug!(key, waiter = %id, policy = policy.kind(), "caller blocked");
            (WaiterSlot::new(self.registry.clone(), key.to_string(), id), rx)
        };
        let id = slot.id;

        let result = tokio::select! {
            outcome = &mut rx => match outcome {
                Ok(WaiterOutcome::Delivered(elems)) => {
                    trace!(key, waiter = %id, n = elems.len(), "delivered");
                    Ok(Some(elems))
                }
                Ok(WaiterOutcome::Expired) => {
                    trace!(key, waiter = %id, "timed out");
                    Ok(None)
                }
                Err(_) => Err(PopError::Internal(
                    "waiter resolved without an outcome".to_string(),
                )),
            },
            _ = cancel.cancelled() => {
                if self.registry.take(key, id).await.is_some() {
                    debug!(key, waiter = %id, "cancelled while waiting");
                    Err(PopError::Canceled)
                } else {
                    // The waiter was resolved before the cancel could remove
                    // it; hand over whatever won the race instead of
                    // dropping it.
                    match rx.try_recv() {
                        Ok(WaiterOutcome::Delivered(elems)) => Ok(Some(elems)),
                        Ok(WaiterOutcome::Expired) => Ok(None),
                        Err(_) => Err(PopError::Canceled),
                    }
                }
            }
        };
        slot.release();
        result
    }
}

/// Queue slot held by an in-flight blocking call.
///
/// If the call's future is dropped before resolution and before its
/// cancellation token fires (abandoned inside a `select!` arm, wrapped in
/// an outer `timeout`, connection torn down), the slot deregisters the
/// waiter so it cannot linger in the queue. Claim passes independently
/// skip abandoned waiters, so elements are safe even before this cleanup
/// runs.
struct WaiterSlot {
    registry: WaitRegistry,
    key: Key,
    id: Uuid,
    held: bool,
}

impl WaiterSlot {
    fn new(registry: WaitRegistry, key: Key, id: Uuid) -> Self {
        Self {
            registry,
            key,
            id,
            held: true,
        }
    }

    /// The waiter reached a terminal state through the normal paths; drop
    /// cleanup is no longer needed.
    fn release(mut self) {
        self.held = false;
    }
}

impl Drop for WaiterSlot {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let registry = self.registry.clone();
        let key = std::mem::take(&mut self.key);
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                registry.take(&key, id).await;
            });
        }
    }
}

fn validate_timeout(timeout_ms: i64) -> Result<WaitTimeout, PopError> {
    if timeout_ms < 0 {
        return Err(PopError::InvalidTimeout(timeout_ms));
    }
    Ok(WaitTimeout::from_millis(timeout_ms as u64))
}
