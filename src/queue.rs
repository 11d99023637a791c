// ===============================
// src/queue.rs
// ===============================
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// FIFO handoff between pipeline stages.
///
/// `push` never blocks the producer and wakes at most one waiting consumer.
/// `pop` waits up to the given timeout for an item; an empty result is a
/// normal outcome, not an error. Even with several consumers parked on the
/// same queue, an item is delivered to exactly one of them.
pub struct WaitQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> WaitQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.locked().push_back(item);
        self.notify.notify_one();
    }

    /// Removes and returns the oldest item, waiting up to `timeout` for one
    /// to arrive.
    pub async fn pop(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.locked().pop_front() {
                return Some(item);
            }
            if time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                // Deadline hit; a push may still have raced the wakeup.
                return self.locked().pop_front();
            }
        }
    }

    /// Advisory snapshot; may be stale by the time the caller acts on it.
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    fn locked(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
