use std::{collections::VecDeque, sync::Arc};

use tracing::{debug, trace};

use popq_model::{ClaimPolicy, Element};
use popq_store::{ListStore, StoreError};

use crate::registry::{Waiter, WaiterOutcome};

/// Matches available list elements to claim policies and queued waiters.
///
/// All methods assume the caller holds the key's queue lock; the resolver
/// itself carries no state beyond the store handle.
#[derive(Clone)]
pub struct ClaimResolver {
    store: Arc<dyn ListStore>,
}

impl ClaimResolver {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self { store }
    }

    /// Attempt one non-blocking claim against the current list state.
    ///
    /// `None` iff the list is empty. Otherwise pops `policy.take_limit(len)`
    /// elements tail-first; a partial batch is a success, not a failure.
    pub async fn try_claim(
        &self,
        key: &str,
        policy: &ClaimPolicy,
    ) -> Result<Option<Vec<Element>>, StoreError> {
        let len = self.store.len(key).await?;
        if len == 0 {
            return Ok(None);
        }

        let take = policy.take_limit(len);
        let elems = self.store.pop_tail(key, take).await?;
        trace!(key, policy = policy.kind(), n = elems.len(), "claimed");
        Ok(Some(elems))
    }

    /// One FIFO pass over `queue` after elements were appended to `key`.
    ///
    /// Walks waiters strictly in registration order; each successful claim
    /// removes and resolves the front waiter. Abandoned waiters (receiver
    /// dropped without cancelling) are discarded without claiming anything.
    /// The walk stops at the first waiter the (now empty) list cannot
    /// serve; everyone behind it stays queued for the next append or until
    /// their deadline passes.
    pub(crate) async fn run_pass(
        &self,
        key: &str,
        queue: &mut VecDeque<Waiter>,
    ) -> Result<(), StoreError> {
        while let Some(front) = queue.front() {
            if front.is_abandoned() {
                if let Some(gone) = queue.pop_front() {
                    debug!(key, waiter = %gone.id, "abandoned waiter discarded");
                }
                continue;
            }
            match self.try_claim(key, &front.policy).await? {
                Some(elems) => {
                    if let Some(waiter) = queue.pop_front() {
                        debug!(key, waiter = %waiter.id, n = elems.len(), "claim pass delivered");
                        if let Some(WaiterOutcome::Delivered(rejected)) =
                            waiter.resolve(WaiterOutcome::Delivered(elems))
                        {
                            // The receiver vanished between the liveness
                            // check and the send. Restore the elements in
                            // their original tail order and keep walking.
                            let restore = rejected.into_iter().rev().collect();
                            self.store.push_tail(key, restore).await?;
                        }
                    }
                }
                None => break,
            }
        }
        Ok(())
    }
}
