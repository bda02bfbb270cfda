//! SPDX-License-Identifier: GPL-3.0-or-later

use super::Queue;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// `enqueue` blocks while the queue is at capacity; `dequeue` blocks
/// while empty. Used wherever losing a message is unacceptable: the
/// object detector's input, the broker's input, the notifier's input
/// (spec §4.1).
pub struct BlockingQueue<T> {
    state: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T: Clone> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be >= 1");
        Self {
            state: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// A capacity-1 "latest value" singleton.
    pub fn singleton() -> Self {
        Self::new(1)
    }
}

impl<T: Clone> Queue<T> for BlockingQueue<T> {
    fn enqueue(&self, item: T) {
        let mut q = self.state.lock().unwrap();
        while q.len() == self.capacity {
            q = self.not_full.wait(q).unwrap();
        }
        q.push_back(item);
        self.not_empty.notify_all();
    }

    fn dequeue(&self) -> T {
        let mut q = self.state.lock().unwrap();
        while q.is_empty() {
            q = self.not_empty.wait(q).unwrap();
        }
        let item = q.pop_front().expect("checked non-empty above");
        self.not_full.notify_all();
        item
    }

    fn read(&self, timeout: Duration) -> Option<T> {
        let q = self.state.lock().unwrap();
        let (q, _) = self.not_empty.wait_timeout(q, timeout).unwrap();
        q.back().cloned()
    }

    fn abrupt_stop(&self, sentinel: T) {
        let mut q = self.state.lock().unwrap();
        q.push_front(sentinel);
        self.not_empty.notify_all();
    }

    fn wait_for_empty(&self, timeout: Duration) -> bool {
        let q = self.state.lock().unwrap();
        if q.is_empty() {
            return true;
        }
        let (q, _) = self
            .not_full
            .wait_timeout_while(q, timeout, |q| !q.is_empty())
            .unwrap();
        q.is_empty()
    }

    fn size(&self) -> usize {
        self.state.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_preserved() {
        let q = BlockingQueue::new(4);
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.dequeue(), 1);
        assert_eq!(q.dequeue(), 2);
        assert_eq!(q.dequeue(), 3);
    }

    #[test]
    fn never_exceeds_capacity() {
        // P4: the blocking queue never admits more than N elements.
        let q = Arc::new(BlockingQueue::new(2));
        q.enqueue(1);
        q.enqueue(2);
        assert_eq!(q.size(), 2);

        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.enqueue(3); // blocks until a slot frees
        });
        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.size(), 2, "enqueue on full queue must block, not admit a 3rd element");
        assert_eq!(q.dequeue(), 1);
        handle.join().unwrap();
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn abrupt_stop_is_seen_first() {
        let q: BlockingQueue<i32> = BlockingQueue::new(4);
        q.enqueue(1);
        q.enqueue(2);
        q.abrupt_stop(-1);
        assert_eq!(q.dequeue(), -1);
        assert_eq!(q.dequeue(), 1);
    }

    #[test]
    fn wait_for_empty_reports_drain() {
        let q = BlockingQueue::new(4);
        q.enqueue(1);
        assert!(!q.wait_for_empty(Duration::from_millis(10)));
        q.dequeue();
        assert!(q.wait_for_empty(Duration::from_millis(10)));
    }
}
