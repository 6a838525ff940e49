use std::{cmp::Reverse, collections::BinaryHeap};

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use popq_model::Key;

use crate::registry::{WaitRegistry, WaiterOutcome};

/// An armed deadline for one pending waiter.
#[derive(Debug, PartialEq, Eq)]
struct Deadline {
    at: Instant,
    id: Uuid,
    key: Key,
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at.cmp(&other.at).then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Expires waiters whose deadlines pass, independent of resolver activity.
///
/// A single background task owns a min-heap of deadlines and sleeps until
/// the earliest one. Firing removes the waiter from its key's queue and
/// resolves it with "no data"; entries whose waiter was already delivered
/// or cancelled find nothing to remove and are discarded. Waiters with no
/// deadline are simply never armed.
pub struct TimeoutScheduler {
    tx: mpsc::UnboundedSender<Deadline>,
    shutdown: CancellationToken,
}

impl TimeoutScheduler {
    /// Spawn the scheduler task. Must be called within a tokio runtime.
    pub fn spawn(registry: WaitRegistry) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        tokio::spawn(run(registry, rx, shutdown.clone()));
        Self { tx, shutdown }
    }

    /// Arm a deadline for the waiter `id` queued against `key`.
    pub(crate) fn arm(&self, key: &str, id: Uuid, at: Instant) {
        let armed = self.tx.send(Deadline {
            at,
            id,
            key: key.to_string(),
        });
        if armed.is_err() {
            debug!(key, waiter = %id, "scheduler is down, deadline dropped");
        }
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run(
    registry: WaitRegistry,
    mut rx: mpsc::UnboundedReceiver<Deadline>,
    shutdown: CancellationToken,
) {
    let mut heap: BinaryHeap<Reverse<Deadline>> = BinaryHeap::new();

    loop {
        let next = heap.peek().map(|Reverse(d)| d.at);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(deadline) => heap.push(Reverse(deadline)),
                None => break,
            },
            _ = sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                if let Some(Reverse(due)) = heap.pop() {
                    fire(&registry, due).await;
                }
            }
        }
    }
    trace!("timeout scheduler stopped");
}

async fn fire(registry: &WaitRegistry, due: Deadline) {
    match registry.take(&due.key, due.id).await {
        Some(waiter) => {
            debug!(key = %due.key, waiter = %due.id, "waiter expired");
            waiter.resolve(WaiterOutcome::Expired);
        }
        // Already delivered or cancelled; the heap entry was stale.
        None => trace!(key = %due.key, waiter = %due.id, "stale deadline discarded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Waiter;
    use popq_model::ClaimPolicy;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn expires_a_pending_waiter() {
        let registry = WaitRegistry::new();
        let scheduler = TimeoutScheduler::spawn(registry.clone());

        let deadline = Instant::now() + Duration::from_millis(100);
        let (waiter, rx) = Waiter::new(ClaimPolicy::All, Some(deadline));
        let id = waiter.id;
        {
            let (_, mut guard) = registry.lock_key("q").await;
            guard.push_back(waiter);
        }
        scheduler.arm("q", id, deadline);

        match rx.await.unwrap() {
            WaiterOutcome::Expired => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(registry.waiter_count("q").await, 0);
        assert_eq!(registry.key_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_deadline_is_discarded() {
        let registry = WaitRegistry::new();
        let scheduler = TimeoutScheduler::spawn(registry.clone());

        let deadline = Instant::now() + Duration::from_millis(50);
        let (waiter, rx) = Waiter::new(ClaimPolicy::All, Some(deadline));
        let id = waiter.id;
        {
            let (_, mut guard) = registry.lock_key("q").await;
            guard.push_back(waiter);
        }
        scheduler.arm("q", id, deadline);

        // Deliver before the deadline fires.
        let delivered = registry.take("q", id).await.unwrap();
        delivered.resolve(WaiterOutcome::Delivered(vec![b"x".to_vec()]));

        match rx.await.unwrap() {
            WaiterOutcome::Delivered(_) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Let the stale entry fire; nothing should blow up or re-resolve.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(registry.key_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_in_deadline_order() {
        let registry = WaitRegistry::new();
        let scheduler = TimeoutScheduler::spawn(registry.clone());

        let late = Instant::now() + Duration::from_millis(200);
        let soon = Instant::now() + Duration::from_millis(50);

        let (w_late, rx_late) = Waiter::new(ClaimPolicy::All, Some(late));
        let (w_soon, rx_soon) = Waiter::new(ClaimPolicy::All, Some(soon));
        let (late_id, soon_id) = (w_late.id, w_soon.id);
        {
            let (_, mut guard) = registry.lock_key("q").await;
            guard.push_back(w_late);
            guard.push_back(w_soon);
        }
        // Armed out of order on purpose.
        scheduler.arm("q", late_id, late);
        scheduler.arm("q", soon_id, soon);

        let started = Instant::now();
        rx_soon.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(registry.waiter_count("q").await, 1);

        rx_late.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
