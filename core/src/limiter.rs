//! SPDX-License-Identifier: GPL-3.0-or-later

//! `FrameLimiter` paces a loop to a requested FPS by sleeping the residual
//! of `1/rate - elapsed` (spec §4.2).

use std::time::{Duration, Instant};

pub struct FrameLimiter {
    period: Duration,
    last_tick: Option<Instant>,
}

impl FrameLimiter {
    pub fn new(rate_fps: f64) -> Self {
        let period = if rate_fps > 0.0 {
            Duration::from_secs_f64(1.0 / rate_fps)
        } else {
            Duration::ZERO
        };
        Self {
            period,
            last_tick: None,
        }
    }

    /// Sleeps as needed so successive calls are spaced `period` apart.
    pub fn tick(&mut self) {
        if self.period.is_zero() {
            self.last_tick = Some(Instant::now());
            return;
        }
        if let Some(last) = self.last_tick {
            let elapsed = last.elapsed();
            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
        }
        self.last_tick = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paces_successive_ticks_at_least_one_period_apart() {
        let mut limiter = FrameLimiter::new(20.0); // 50ms period
        let start = Instant::now();
        limiter.tick();
        limiter.tick();
        limiter.tick();
        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[test]
    fn zero_rate_never_sleeps() {
        let mut limiter = FrameLimiter::new(0.0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.tick();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
