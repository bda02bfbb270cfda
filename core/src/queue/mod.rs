//! SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded queue fabric (spec §4.1 / §5 "Shared state & locking").
//!
//! Two shapes share the same `Queue` trait: [`BlockingQueue`] blocks the
//! producer when full, [`DropOldestQueue`] evicts the oldest element
//! instead. Both are built on a `Mutex`-guarded `VecDeque` plus a
//! `Condvar`, the same primitive pairing used for the group-commit
//! queue elsewhere in this codebase, generalized here with a `read`
//! peek, an `abrupt_stop` sentinel push, and a `size` gauge.

mod blocking;
mod drop_oldest;

pub use blocking::BlockingQueue;
pub use drop_oldest::DropOldestQueue;

use std::time::Duration;

/// Common contract for both queue shapes (spec §4.1).
pub trait Queue<T: Clone> {
    /// Enqueue `item`. Blocking queues wait while full; drop-oldest
    /// queues evict the oldest element instead.
    fn enqueue(&self, item: T);

    /// Remove and return the oldest element, blocking while empty.
    fn dequeue(&self) -> T;

    /// Peek at the most recently enqueued element without consuming it,
    /// waiting up to `timeout` for one to appear if the queue is empty.
    fn read(&self, timeout: Duration) -> Option<T>;

    /// Push `sentinel` to the *front* of the queue so the next `dequeue`
    /// is guaranteed to return it, used to unblock a stopped worker.
    fn abrupt_stop(&self, sentinel: T);

    /// Block until the queue drains or `timeout` elapses; returns
    /// whether it is empty.
    fn wait_for_empty(&self, timeout: Duration) -> bool;

    /// Current element count (exported as a lag gauge).
    fn size(&self) -> usize;
}
