//! Per-order serialization of read-modify-write mutations.
//!
//! Mutations on the same order id queue behind one async mutex; different ids
//! never contend. Entries are weak so the map only holds ids that currently
//! have a guard alive or waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use orderdesk_core::OrderId;

/// Registry of per-order locks.
#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<Mutex<HashMap<OrderId, Weak<AsyncMutex<()>>>>>,
}

/// Held while an order is being mutated.
#[derive(Debug)]
pub struct OrderGuard {
    order_id: OrderId,
    _guard: OwnedMutexGuard<()>,
}

impl OrderGuard {
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        self.order_id
    }
}

impl OrderLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `order_id`.
    pub async fn lock(&self, order_id: OrderId) -> OrderGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = locks.get(&order_id).and_then(Weak::upgrade) {
                existing
            } else {
                locks.retain(|_, weak| weak.strong_count() > 0);
                let fresh = Arc::new(AsyncMutex::new(()));
                locks.insert(order_id, Arc::downgrade(&fresh));
                fresh
            }
        };

        OrderGuard {
            order_id,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of ids with a live lock.
    #[cfg(test)]
    fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_order_waits() {
        let locks = OrderLocks::new();
        let first = locks.lock(OrderId::new(1)).await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move { contender.lock(OrderId::new(1)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(first);
        let second = waiting.await.expect("task panicked");
        assert_eq!(second.order_id(), OrderId::new(1));
    }

    #[tokio::test]
    async fn test_different_orders_do_not_contend() {
        let locks = OrderLocks::new();
        let _a = locks.lock(OrderId::new(1)).await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.lock(OrderId::new(2)))
            .await
            .expect("lock on a different order should not wait");
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_forgotten() {
        let locks = OrderLocks::new();
        drop(locks.lock(OrderId::new(7)).await);
        assert_eq!(locks.active(), 0);
    }
}
