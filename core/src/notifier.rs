//! SPDX-License-Identifier: GPL-3.0-or-later

//! Notifier consumer (spec §4.9 downstream, §6 "notifier rate limits").
//! Drains the broker's forward queue, rate-limits per notification kind
//! with a token bucket, and hands surviving notifications to a
//! [`NotificationSink`] — the actual transport (MQTT, webhook, ...) is an
//! out-of-scope collaborator this module depends on only through that
//! trait.

use crate::notification::Notification;
use crate::queue::Queue;
use log::info;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Discriminant used to key per-kind rate limiters, mirroring the
/// original's `NotificationTypes` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    ObjectDetected,
    PatternDetected,
    DoorStateChanged,
    MotionStateChanged,
}

impl NotificationKind {
    fn of(n: &Notification) -> Option<Self> {
        match n {
            Notification::ObjectDetected { .. } => Some(Self::ObjectDetected),
            Notification::PatternDetected { .. } => Some(Self::PatternDetected),
            Notification::DoorStateChanged(_) => Some(Self::DoorStateChanged),
            Notification::MotionStateChanged(_) => Some(Self::MotionStateChanged),
            Notification::Stop => None,
        }
    }
}

/// Fixed bucket capacity, matching the original's `token_bucket.Limiter(rate
/// * 10, 10, storage)` — the `10` here is the constant capacity, not a
/// function of `rate`.
const BUCKET_CAPACITY: u64 = 10;

/// Token bucket over fixed-point ticks (`rate` tokens added per second,
/// `burst` max tokens held), ported from the original's `token_bucket`
/// usage (`rate*10` tokens/sec refill, fixed capacity of 10).
struct TokenBucket {
    tokens: AtomicU64,
    rate_per_sec: f64,
    burst: u64,
    last_refill: Mutex<Instant>,
}

impl TokenBucket {
    fn new(rate_per_sec: f64) -> Self {
        let burst = BUCKET_CAPACITY;
        Self {
            tokens: AtomicU64::new(burst),
            rate_per_sec,
            burst,
            last_refill: Mutex::new(Instant::now()),
        }
    }

    fn consume(&self, cost: u64) -> bool {
        self.refill();
        loop {
            let current = self.tokens.load(Ordering::Acquire);
            if current < cost {
                return false;
            }
            if self
                .tokens
                .compare_exchange(current, current - cost, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn refill(&self) {
        let mut last = self.last_refill.lock().unwrap();
        let elapsed = last.elapsed().as_secs_f64();
        let add = (elapsed * self.rate_per_sec * 10.0) as u64;
        if add > 0 {
            *last = Instant::now();
            let current = self.tokens.load(Ordering::Acquire);
            let next = (current + add).min(self.burst);
            self.tokens.store(next, Ordering::Release);
        }
    }
}

/// The out-of-scope delivery transport (MQTT / webhook / ...).
pub trait NotificationSink: Send + Sync {
    fn send(&self, notification: &Notification);
}

/// A sink that only logs — used when no transport is configured, and in
/// tests.
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn send(&self, notification: &Notification) {
        info!("notification: {notification:?}");
    }
}

pub struct Notifier {
    input: Arc<dyn Queue<Notification>>,
    sink: Arc<dyn NotificationSink>,
    rate_limits: HashMap<NotificationKind, f64>,
    limiters: Mutex<HashMap<NotificationKind, TokenBucket>>,
}

impl Notifier {
    pub fn new(
        input: Arc<dyn Queue<Notification>>,
        sink: Arc<dyn NotificationSink>,
        rate_limits: HashMap<NotificationKind, f64>,
    ) -> Self {
        Self {
            input,
            sink,
            rate_limits,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Runs until the stop sentinel is dequeued (spec §4.9 "Sentinel -1
    /// exits the loop").
    pub fn run(&self) {
        loop {
            let notification = self.input.dequeue();
            if matches!(notification, Notification::Stop) {
                break;
            }
            if self.can_notify(&notification) {
                self.sink.send(&notification);
            }
        }
    }

    fn can_notify(&self, notification: &Notification) -> bool {
        let Some(kind) = NotificationKind::of(notification) else {
            return true;
        };
        let Some(&rate) = self.rate_limits.get(&kind) else {
            return true;
        };
        if rate < 1.0 {
            return true;
        }
        let mut limiters = self.limiters.lock().unwrap();
        let bucket = limiters.entry(kind).or_insert_with(|| TokenBucket::new(rate));
        let allowed = bucket.consume(10);
        if !allowed {
            info!("{kind:?} notification rate limited at {rate} fps");
        }
        allowed
    }
}
