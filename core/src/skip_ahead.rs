//! SPDX-License-Identifier: GPL-3.0-or-later

//! Skip-ahead optimizer (spec §4.8, C8): lets an expensive producer elide
//! work for a task when no configured pattern currently wants the state
//! it would produce.

use crate::pattern::PatternDetector;
use crate::state::State;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait SkipAheadOptimizer: Send + Sync {
    fn skip_task(&self, ts: f64) -> bool;

    fn total(&self) -> u64;
    fn skipped(&self) -> u64;

    /// `skipped / total`, as a percentage (spec §4.8 "speedup metric").
    fn speedup(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.skipped() as f64 / total as f64) * 100.0
        }
    }
}

/// No-skip implementation used when pattern detection is disabled (spec
/// §4.8 "default no-skip implementation").
pub struct DefaultSkipAheadOptimizer;

impl SkipAheadOptimizer for DefaultSkipAheadOptimizer {
    fn skip_task(&self, _ts: f64) -> bool {
        false
    }
    fn total(&self) -> u64 {
        0
    }
    fn skipped(&self) -> u64 {
        0
    }
}

/// How often (in task calls) the speedup stat is logged (spec §4.8
/// "periodic stats") — logging every call would flood at frame rate.
const STATS_LOG_INTERVAL: u64 = 100;

/// One instance per expensive producer, parameterized by the state type
/// it produces.
pub struct PatternBasedSkipAheadOptimizer {
    pattern_detector: Arc<PatternDetector>,
    skip_state: State,
    total: AtomicU64,
    skipped: AtomicU64,
}

impl PatternBasedSkipAheadOptimizer {
    pub fn new(pattern_detector: Arc<PatternDetector>, skip_state: State) -> Self {
        Self {
            pattern_detector,
            skip_state,
            total: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }
}

impl SkipAheadOptimizer for PatternBasedSkipAheadOptimizer {
    fn skip_task(&self, ts: f64) -> bool {
        let wanted = self.pattern_detector.states_in_demand(ts);
        let skip = !wanted.contains(&self.skip_state);

        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        if skip {
            self.skipped.fetch_add(1, Ordering::Relaxed);
        }
        if total % STATS_LOG_INTERVAL == 0 {
            info!(
                "{:?} detector speedup: {:.1}% ({}/{})",
                self.skip_state,
                self.speedup(),
                self.skipped(),
                self.total()
            );
        }
        skip
    }

    fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DoorState, ObjectState, Pattern, PatternStep};

    #[test]
    fn default_optimizer_never_skips() {
        let opt = DefaultSkipAheadOptimizer;
        assert!(!opt.skip_task(1.0));
        assert!(!opt.skip_task(2.0));
        assert_eq!(opt.speedup(), 0.0);
    }

    #[test]
    fn pattern_based_optimizer_skips_when_state_not_wanted() {
        let pattern = Pattern {
            id: "p".into(),
            steps: vec![PatternStep::State(State::Door(DoorState::Open))],
        };
        let pd = Arc::new(PatternDetector::new(vec![pattern], 20.0, 300.0));
        let opt = PatternBasedSkipAheadOptimizer::new(pd, State::Object(ObjectState::ObjectDetected));
        assert!(opt.skip_task(1.0));
        assert_eq!(opt.total(), 1);
        assert_eq!(opt.skipped(), 1);
    }

    #[test]
    fn pattern_based_optimizer_does_not_skip_when_state_wanted() {
        let pattern = Pattern {
            id: "p".into(),
            steps: vec![
                PatternStep::State(State::Door(DoorState::Open)),
                PatternStep::State(State::Object(ObjectState::ObjectDetected)),
            ],
        };
        let pd = Arc::new(PatternDetector::new(vec![pattern], 20.0, 300.0));
        pd.add_to_state_history(
            crate::state::StateHistoryStep::new(State::Door(DoorState::Open), 1.0),
            false,
        );
        let opt = PatternBasedSkipAheadOptimizer::new(pd, State::Object(ObjectState::ObjectDetected));
        assert!(!opt.skip_task(1.0));
    }
}
