use std::time::SystemTime;

use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use popq_model::{ClaimPolicy, Element, WaiterInfo};

/// Terminal resolution delivered to a suspended caller.
#[derive(Debug)]
pub(crate) enum WaiterOutcome {
    /// Elements claimed on the waiter's behalf, tail-first.
    Delivered(Vec<Element>),
    /// The deadline passed with nothing to claim.
    Expired,
}

/// A suspended caller queued against a key.
///
/// Owned exclusively by its key's queue while pending. Removing it from
/// the queue consumes the record together with its result channel, so
/// exactly one of delivery, expiry and cancellation can resolve it; the
/// losing paths find the queue slot already empty and do nothing.
pub(crate) struct Waiter {
    pub id: Uuid,
    pub policy: ClaimPolicy,
    pub registered_at: SystemTime,
    pub deadline: Option<Instant>,
    tx: oneshot::Sender<WaiterOutcome>,
}

impl Waiter {
    pub fn new(
        policy: ClaimPolicy,
        deadline: Option<Instant>,
    ) -> (Self, oneshot::Receiver<WaiterOutcome>) {
        let (tx, rx) = oneshot::channel();
        let waiter = Self {
            id: Uuid::new_v4(),
            policy,
            registered_at: SystemTime::now(),
            deadline,
            tx,
        };
        (waiter, rx)
    }

    /// The caller's receiver is gone: the future holding it was dropped
    /// without cancelling. Such a waiter can never take delivery and must
    /// be skipped by claim passes.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolve the waiter. If the receiver already went away the outcome
    /// is handed back so the caller can recover any claimed elements.
    pub fn resolve(self, outcome: WaiterOutcome) -> Option<WaiterOutcome> {
        self.tx.send(outcome).err()
    }

    /// Introspection snapshot of a still-pending waiter.
    pub fn info(&self, key: &str) -> WaiterInfo {
        let expires_at = self.deadline.map(|at| {
            let remaining = at.saturating_duration_since(Instant::now());
            SystemTime::now() + remaining
        });
        WaiterInfo {
            id: self.id.to_string(),
            key: key.to_string(),
            policy: self.policy,
            registered_at: self.registered_at,
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolve_reaches_the_receiver() {
        let (waiter, rx) = Waiter::new(ClaimPolicy::All, None);
        waiter.resolve(WaiterOutcome::Delivered(vec![b"x".to_vec()]));

        match rx.await {
            Ok(WaiterOutcome::Delivered(elems)) => assert_eq!(elems, vec![b"x".to_vec()]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_after_receiver_dropped_returns_the_outcome() {
        let (waiter, rx) = Waiter::new(ClaimPolicy::All, None);
        assert!(!waiter.is_abandoned());

        drop(rx);
        assert!(waiter.is_abandoned());

        let rejected = waiter.resolve(WaiterOutcome::Delivered(vec![b"x".to_vec()]));
        assert!(matches!(
            rejected,
            Some(WaiterOutcome::Delivered(elems)) if elems == vec![b"x".to_vec()]
        ));
    }

    #[tokio::test]
    async fn info_reflects_policy_and_deadline() {
        let deadline = Instant::now() + Duration::from_secs(60);
        let (waiter, _rx) = Waiter::new(ClaimPolicy::Batch { count: 2 }, Some(deadline));

        let info = waiter.info("jobs");
        assert_eq!(info.key, "jobs");
        assert_eq!(info.policy, ClaimPolicy::Batch { count: 2 });
        assert!(info.expires_at.is_some());

        let (forever, _rx) = Waiter::new(ClaimPolicy::All, None);
        assert!(forever.info("jobs").expires_at.is_none());
    }
}
