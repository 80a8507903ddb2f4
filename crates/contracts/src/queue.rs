//! BoundedQueue - blocking bounded FIFO with drop-oldest overflow.
//!
//! Shared by the acquisition context (hardware output queue) and the worker
//! (result queue). Pushing past capacity evicts the oldest entry and counts
//! the drop; consumers poll non-blockingly or wait with a timeout.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

/// Bounded FIFO queue with blocking pop and drop-oldest overflow.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
                dropped: 0,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Push an item, evicting the oldest entry when full.
    ///
    /// Returns `false` when an entry was evicted to make room.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let mut fitted = true;
        while inner.items.len() >= inner.capacity {
            inner.items.pop_front();
            inner.dropped += 1;
            fitted = false;
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        fitted
    }

    /// Remove the oldest item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().unwrap().items.pop_front()
    }

    /// Remove the oldest item, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner.items.pop_front() {
            return Some(item);
        }
        let (mut inner, result) = self
            .not_empty
            .wait_timeout_while(inner, timeout, |inner| inner.items.is_empty())
            .unwrap();
        if result.timed_out() && inner.items.is_empty() {
            return None;
        }
        inner.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    /// Resize the queue, evicting oldest entries if it shrinks below its
    /// current length.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.capacity = capacity.max(1);
        while inner.items.len() > inner.capacity {
            inner.items.pop_front();
            inner.dropped += 1;
        }
    }

    /// Total items evicted due to overflow.
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().unwrap().dropped
    }

    /// Drop all queued items.
    pub fn clear(&self) {
        self.inner.lock().unwrap().items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_fifo() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = BoundedQueue::new(2);
        assert!(q.push(1));
        assert!(q.push(2));
        assert!(!q.push(3));

        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
    }

    #[test]
    fn pop_timeout_expires_empty() {
        let q: BoundedQueue<u32> = BoundedQueue::new(2);
        let start = std::time::Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn pop_timeout_wakes_on_push() {
        let q = Arc::new(BoundedQueue::new(2));
        let producer = Arc::clone(&q);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.push(42);
        });

        assert_eq!(q.pop_timeout(Duration::from_secs(1)), Some(42));
        handle.join().unwrap();
    }

    #[test]
    fn shrink_evicts_oldest() {
        let q = BoundedQueue::new(4);
        for i in 0..4 {
            q.push(i);
        }
        q.set_capacity(2);
        assert_eq!(q.len(), 2);
        assert_eq!(q.try_pop(), Some(2));
    }
}
