use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{BulkError, Result};

/// Counting admission control for in-flight batches.
///
/// A slot is held by a [`Permit`] and given back when the permit is dropped.
/// Releasing never blocks.
#[derive(Debug)]
pub struct ConcurrencyGate {
    capacity: usize,
    admitted: AtomicUsize,
    released: Notify,
}

#[derive(Debug)]
pub struct Permit {
    gate: Arc<ConcurrencyGate>,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            admitted: AtomicUsize::new(0),
            released: Notify::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.capacity - self.in_flight()
    }

    /// Waits for a free slot.
    pub async fn acquire(self: &Arc<Self>) -> Permit {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // register before checking so a release in between is not missed
            notified.as_mut().enable();

            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            notified.await;
        }
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut current = self.admitted.load(Ordering::Acquire);
        while current < self.capacity {
            match self.admitted.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(Permit {
                        gate: Arc::clone(self),
                    })
                }
                Err(actual) => current = actual,
            }
        }
        None
    }

    /// Waits until no slot is held, or fails once `timeout` has elapsed.
    pub async fn drain(&self, timeout: Duration) -> Result<()> {
        let wait_idle = async {
            loop {
                let notified = self.released.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait_idle)
            .await
            .map_err(|_| BulkError::DrainTimeout {
                timeout,
                in_flight: self.in_flight(),
                pending_restore: None,
            })
    }

    fn release(&self) {
        let previous = self.admitted.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "gate released more often than acquired");
        self.released.notify_waiters();
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
