//! SPDX-License-Identifier: GPL-3.0-or-later

//! Sliding-bucket FPS gauge, ported from the original system's `lib/fps.py`.
//! Window length is `num_buckets * bucket_size`; the smaller the bucket,
//! the more precise the estimate.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Buckets {
    frames: Vec<u64>,
    head: u64,
    sliding_total: u64,
    filled_length: u64,
    start: Option<Instant>,
}

pub struct Fps {
    num_buckets: u64,
    bucket_size: Duration,
    state: Mutex<Buckets>,
}

impl Fps {
    pub fn new(num_buckets: u64, bucket_size: Duration) -> Self {
        Self {
            num_buckets,
            bucket_size,
            state: Mutex::new(Buckets {
                frames: vec![0; num_buckets as usize],
                head: 0,
                sliding_total: 0,
                filled_length: 0,
                start: None,
            }),
        }
    }

    /// 50 buckets of 100ms each — a 5 second window, the original's
    /// default.
    pub fn default_window() -> Self {
        Self::new(50, Duration::from_millis(100))
    }

    pub fn count(&self) {
        let mut s = self.state.lock().unwrap();
        let start = *s.start.get_or_insert_with(Instant::now);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let bucket = (elapsed_ms as f64 / self.bucket_size.as_millis() as f64).round() as u64;

        if bucket.saturating_sub(s.head) > self.num_buckets - 1 {
            let shifts = bucket - s.head - (self.num_buckets - 1);
            for _ in 0..shifts {
                let oldest = s.frames.remove(0);
                s.sliding_total -= oldest;
                s.frames.push(0);
                s.head += 1;
            }
        }

        let idx = (bucket - s.head) as usize;
        s.frames[idx] += 1;
        s.sliding_total += 1;
        s.filled_length = bucket - s.head + 1;
    }

    /// Frames per second averaged over the filled portion of the window.
    pub fn fps(&self) -> f64 {
        let s = self.state.lock().unwrap();
        if s.filled_length == 0 {
            return 0.0;
        }
        (1000.0 / self.bucket_size.as_millis() as f64) * s.sliding_total as f64 / s.filled_length as f64
    }
}
