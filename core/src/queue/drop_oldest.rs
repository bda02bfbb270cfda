//! SPDX-License-Identifier: GPL-3.0-or-later

use super::Queue;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// `enqueue` never blocks: once at capacity it evicts the oldest element
/// to make room. Used for display output and free-running frame sources,
/// where latency matters more than coverage (spec §4.1).
pub struct DropOldestQueue<T> {
    state: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T: Clone> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be >= 1");
        Self {
            state: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn singleton() -> Self {
        Self::new(1)
    }
}

impl<T: Clone> Queue<T> for DropOldestQueue<T> {
    fn enqueue(&self, item: T) {
        let mut q = self.state.lock().unwrap();
        if q.len() == self.capacity {
            q.pop_front();
        }
        q.push_back(item);
        self.not_empty.notify_all();
    }

    fn dequeue(&self) -> T {
        let mut q = self.state.lock().unwrap();
        while q.is_empty() {
            q = self.not_empty.wait(q).unwrap();
        }
        q.pop_front().expect("checked non-empty above")
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
        // Nothing ever blocks on this queue being full, so there is no
        // condvar to wait on for a drain; poll instead.
        drop(q);
        std::thread::sleep(timeout);
        self.state.lock().unwrap().is_empty()
    }

    fn size(&self) -> usize {
        self.state.lock().unwrap().len()
    }
}
