//! SPDX-License-Identifier: GPL-3.0-or-later

//! The pattern detector (spec §4.7) — the algorithmic heart of the pipeline.
//!
//! Owns the ordered state history, matches configured patterns against it
//! on a timer, and answers "what is still wanted" for the skip-ahead
//! optimizer (spec §4.8).

use crate::state::{NotState, ObjectAttrs, Pattern, PatternId, PatternStep, State, StateHistoryStep};
use std::collections::HashSet;
use std::sync::Mutex;

/// Outcome of matching one pattern against the history (spec §8, L2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMatch {
    Matched,
    NotMatched,
    PartialMatch,
}

/// Result of a single pattern evaluation: the verdict plus, when attached
/// to a `PatternDetector::detect_patterns` pass, the attrs of the most
/// recent `OBJECT_DETECTED` step (spec §9 "Attrs aggregation").
#[derive(Debug, Clone)]
pub struct PatternDetection {
    pub pattern_id: PatternId,
    pub attrs: Option<ObjectAttrs>,
}

/// Scans backwards from `from_idx` down to `to_idx` (inclusive) looking
/// for an occurrence of `not_state.state` within `not_state.duration` of
/// `reference_ts`. Mirrors `find_not_state_before_step` in the original
/// pattern matcher.
fn occurs_before(
    not_state: &NotState,
    history: &[StateHistoryStep],
    reference_ts: f64,
    from_idx: isize,
    to_idx: isize,
) -> bool {
    let mut idx = from_idx;
    while idx >= to_idx {
        if idx < 0 {
            break;
        }
        let step = &history[idx as usize];
        if step.state == not_state.state && not_state.within_window(reference_ts, step.ts) {
            return true;
        }
        idx -= 1;
    }
    false
}

/// Single-anchor matcher (spec §4.7 "Matcher"). `now` stands in for the
/// evaluation time; callers typically pass `ts_commit`.
fn find_at_idx(
    pattern: &[PatternStep],
    history: &[StateHistoryStep],
    start_idx: usize,
    now: f64,
) -> (PatternMatch, HashSet<State>) {
    let mut ptn_idx = 0usize;
    let mut prev_match_idx: isize = -1;
    let mut prev_match_ts = 0.0f64;
    let mut i = start_idx;

    while ptn_idx < pattern.len() && i < history.len() && history[i].ts <= now {
        let step = &pattern[ptn_idx];
        let hstep = &history[i];

        if let PatternStep::State(state) = step {
            if *state == hstep.state {
                if ptn_idx > 0 {
                    if let PatternStep::Not(ns) = &pattern[ptn_idx - 1] {
                        if occurs_before(ns, history, hstep.ts, i as isize - 1, prev_match_idx + 1) {
                            ptn_idx = 0;
                            break;
                        }
                    }
                }
                ptn_idx += 1;
                prev_match_idx = i as isize;
                prev_match_ts = hstep.ts;
            }
            i += 1;
        } else if let PatternStep::Not(ns) = step {
            if ptn_idx == pattern.len() - 1 {
                let elapsed = now - prev_match_ts;
                let duration_elapsed = match ns.duration {
                    None => true,
                    Some(d) => elapsed > d,
                };
                if duration_elapsed {
                    if occurs_before(ns, history, prev_match_ts, history.len() as isize - 1, i as isize) {
                        ptn_idx = 0;
                        break;
                    }
                    ptn_idx = pattern.len();
                }
                break;
            }
            ptn_idx += 1;
        }
    }

    let wanted = states_wanted_at(pattern, ptn_idx);

    let result = if ptn_idx == 0 {
        PatternMatch::NotMatched
    } else if ptn_idx == 1 && matches!(pattern[0], PatternStep::Not(_)) {
        PatternMatch::NotMatched
    } else if ptn_idx < pattern.len() {
        PatternMatch::PartialMatch
    } else {
        PatternMatch::Matched
    };

    (result, wanted)
}

/// The states a best-effort run at `ptn_idx` is still waiting for: the
/// step itself and, if the step is preceded by a `NotState`, the state it
/// forbids (spec §4.7 "also reports the set of states it is waiting
/// for").
fn states_wanted_at(pattern: &[PatternStep], ptn_idx: usize) -> HashSet<State> {
    let mut wanted = HashSet::new();
    if ptn_idx >= pattern.len() {
        return wanted;
    }
    match &pattern[ptn_idx] {
        PatternStep::State(s) => {
            wanted.insert(*s);
        }
        PatternStep::Not(ns) => {
            wanted.insert(ns.state);
        }
    }
    if ptn_idx > 0 {
        if let PatternStep::Not(ns) = &pattern[ptn_idx - 1] {
            wanted.insert(ns.state);
        }
    }
    wanted
}

/// Scans every anchor position and returns the most-progressed outcome
/// (spec §4.7, L2 determinism).
fn find_pattern(
    pattern: &[PatternStep],
    history: &[StateHistoryStep],
    now: f64,
) -> (PatternMatch, HashSet<State>) {
    let mut partial_found = false;
    let mut wanted_union = HashSet::new();

    for idx in 0..history.len().max(1) {
        if history.is_empty() {
            break;
        }
        let (result, wanted) = find_at_idx(pattern, history, idx, now);
        match result {
            PatternMatch::Matched => return (PatternMatch::Matched, wanted),
            PatternMatch::PartialMatch => {
                partial_found = true;
                wanted_union.extend(wanted);
            }
            PatternMatch::NotMatched => {
                wanted_union.extend(wanted);
            }
        }
    }

    if partial_found {
        (PatternMatch::PartialMatch, wanted_union)
    } else {
        (PatternMatch::NotMatched, wanted_union)
    }
}

/// A registered producer's lag, read by the pattern detector when
/// computing `ts_commit` (spec §3 "CommittedOffset").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommittedOffset {
    Current,
    At(f64),
}

/// Anything that can report its own commit watermark. State managers
/// implement this so the pattern detector can learn it is "waiting on"
/// a slow producer (spec §4.6).
pub trait CommittedOffsetSource: Send + Sync {
    fn latest_committed_offset(&self) -> CommittedOffset;
}

fn min_committed_offset(sources: &[std::sync::Arc<dyn CommittedOffsetSource>]) -> CommittedOffset {
    let mut min: Option<f64> = None;
    for src in sources {
        if let CommittedOffset::At(ts) = src.latest_committed_offset() {
            min = Some(match min {
                Some(m) => m.min(ts),
                None => ts,
            });
        }
    }
    match min {
        Some(ts) => CommittedOffset::At(ts),
        None => CommittedOffset::Current,
    }
}

struct HistoryState {
    steps: Vec<StateHistoryStep>,
    any_partial: bool,
}

/// Owns the ordered state history and the configured patterns (spec §4.7,
/// C7). The evaluation loop itself lives in `orchestrator.rs`, which owns
/// the timer thread; this type exposes the pure operations it drives.
pub struct PatternDetector {
    patterns: Vec<Pattern>,
    history: Mutex<HistoryState>,
    state_history_length: f64,
    state_history_length_partial: f64,
    sources: Mutex<Vec<std::sync::Arc<dyn CommittedOffsetSource>>>,
}

impl PatternDetector {
    pub fn new(patterns: Vec<Pattern>, state_history_length: f64, state_history_length_partial: f64) -> Self {
        Self {
            patterns,
            history: Mutex::new(HistoryState {
                steps: Vec::new(),
                any_partial: false,
            }),
            state_history_length,
            state_history_length_partial,
            sources: Mutex::new(Vec::new()),
        }
    }

    pub fn register_state_manager(&self, source: std::sync::Arc<dyn CommittedOffsetSource>) {
        self.sources.lock().unwrap().push(source);
    }

    /// Binary-searches the insertion point by `ts`, optionally refusing
    /// insertion when the immediately preceding step shares the same
    /// state (spec §4.7 "Insertion", I2). Returns whether it was
    /// inserted.
    pub fn add_to_state_history(&self, step: StateHistoryStep, avoid_duplicates: bool) -> bool {
        let mut h = self.history.lock().unwrap();
        let idx = h.steps.partition_point(|s| s.ts <= step.ts);
        if avoid_duplicates && idx > 0 && h.steps[idx - 1].state == step.state {
            return false;
        }
        h.steps.insert(idx, step);
        true
    }

    pub fn state_history_snapshot(&self) -> Vec<StateHistoryStep> {
        self.history.lock().unwrap().steps.clone()
    }

    fn ts_commit(&self) -> CommittedOffset {
        min_committed_offset(&self.sources.lock().unwrap())
    }

    /// One evaluation pass (spec §4.7 "Evaluation loop" steps 1-4).
    /// Matches every configured pattern, in declaration order, against
    /// the history up to the committed offset, clearing the history on
    /// each match and returning the detections to forward to the broker.
    pub fn detect_patterns(&self) -> Vec<PatternDetection> {
        let now = match self.ts_commit() {
            CommittedOffset::Current => f64::INFINITY,
            CommittedOffset::At(ts) => ts,
        };
        self.evaluate_at(now)
    }

    fn evaluate_at(&self, now: f64) -> Vec<PatternDetection> {
        let mut detections = Vec::new();
        let mut any_partial = false;

        for pattern in &self.patterns {
            let snapshot = self.history.lock().unwrap().steps.clone();
            let (result, _wanted) = find_pattern(&pattern.steps, &snapshot, now);
            match result {
                PatternMatch::Matched => {
                    let attrs = latest_object_attrs(&snapshot);
                    self.clear_state_history_till(now);
                    detections.push(PatternDetection {
                        pattern_id: pattern.id.clone(),
                        attrs,
                    });
                }
                PatternMatch::PartialMatch => any_partial = true,
                PatternMatch::NotMatched => {}
            }
        }

        self.history.lock().unwrap().any_partial = any_partial;
        self.prune(now);
        detections
    }

    /// Drops every step with `ts <= till` (spec §4.7 step 3 "clear
    /// history up to and including ts_commit").
    fn clear_state_history_till(&self, till: f64) {
        let mut h = self.history.lock().unwrap();
        h.steps.retain(|s| s.ts > till);
    }

    fn prune(&self, now: f64) {
        let mut h = self.history.lock().unwrap();
        let window = if h.any_partial {
            self.state_history_length_partial
        } else {
            self.state_history_length
        };
        if now.is_finite() {
            h.steps.retain(|s| now - s.ts <= window);
        }
    }

    /// The union, across all patterns, of states a virtual evaluation at
    /// `ts` would still be waiting for (spec §4.8).
    pub fn states_in_demand(&self, ts: f64) -> HashSet<State> {
        let snapshot = self.history.lock().unwrap().steps.clone();
        let mut wanted = HashSet::new();
        for pattern in &self.patterns {
            let (_, w) = find_pattern(&pattern.steps, &snapshot, ts);
            wanted.extend(w);
        }
        wanted
    }

    /// Runs one last evaluation as if the committed offset had reached
    /// `+inf`, so a trailing `NotState` whose duration has elapsed can
    /// still fire during shutdown (spec §4.10 step 4), regardless of
    /// what any still-registered source reports.
    pub fn flush(&self) -> Vec<PatternDetection> {
        self.evaluate_at(f64::INFINITY)
    }
}

fn latest_object_attrs(history: &[StateHistoryStep]) -> Option<ObjectAttrs> {
    let mut attrs = None;
    for step in history {
        if matches!(step.state, State::Object(_)) {
            if let Some(a) = &step.attrs {
                attrs = Some(a.clone());
            }
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DoorState, MotionState, ObjectState};

    fn st(state: State, ts: f64) -> StateHistoryStep {
        StateHistoryStep::new(state, ts)
    }

    fn mo() -> State {
        State::Motion(MotionState::OutsideMask)
    }
    fn mi() -> State {
        State::Motion(MotionState::InsideMask)
    }
    fn nm() -> State {
        State::Motion(MotionState::None)
    }
    fn door_open() -> State {
        State::Door(DoorState::Open)
    }
    fn door_closed() -> State {
        State::Door(DoorState::Closed)
    }
    fn od() -> State {
        State::Object(ObjectState::ObjectDetected)
    }

    // Scenario 1: [MO, DO, DC] on (MI,1)(MI,1)(MO,1)(MI,1)(DO,1)(MI,1)(DC,1)(MI,1) => MATCHED.
    #[test]
    fn scenario_1_basic_subsequence_match() {
        let pattern = vec![
            PatternStep::State(mo()),
            PatternStep::State(door_open()),
            PatternStep::State(door_closed()),
        ];
        let history = vec![
            st(mi(), 1.0),
            st(mi(), 2.0),
            st(mo(), 3.0),
            st(mi(), 4.0),
            st(door_open(), 5.0),
            st(mi(), 6.0),
            st(door_closed(), 7.0),
            st(mi(), 8.0),
        ];
        let (result, _) = find_pattern(&pattern, &history, 8.0);
        assert_eq!(result, PatternMatch::Matched);
    }

    // Scenario 2: [NotState(OD), DO, OD] on (OD,1)(DO,1)(OD,1)(DC,1) => NOT_MATCHED
    // (an OD occurred before the DO, inside the forbidden window of infinity).
    #[test]
    fn scenario_2_leading_notstate_violated() {
        let pattern = vec![
            PatternStep::Not(NotState::new(od(), None)),
            PatternStep::State(door_open()),
            PatternStep::State(od()),
        ];
        let history = vec![
            st(od(), 1.0),
            st(door_open(), 2.0),
            st(od(), 3.0),
            st(door_closed(), 4.0),
        ];
        let (result, _) = find_pattern(&pattern, &history, 4.0);
        assert_eq!(result, PatternMatch::NotMatched);
    }

    // Scenario 3: [NotState(OD,5), DO, OD] on (DO,1)(OD,1)(DC,1) => MATCHED.
    #[test]
    fn scenario_3_bounded_leading_notstate_satisfied() {
        let pattern = vec![
            PatternStep::Not(NotState::new(od(), Some(5.0))),
            PatternStep::State(door_open()),
            PatternStep::State(od()),
        ];
        let history = vec![st(door_open(), 1.0), st(od(), 2.0), st(door_closed(), 3.0)];
        let (result, _) = find_pattern(&pattern, &history, 3.0);
        assert_eq!(result, PatternMatch::Matched);
    }

    // Scenario 4: [OD, DO, DC, NotState(OD,5)] on (OD,1)(DO,1)(OD,1)(DC,1) => PARTIAL (time must pass).
    #[test]
    fn scenario_4_trailing_notstate_awaits_time() {
        let pattern = vec![
            PatternStep::State(od()),
            PatternStep::State(door_open()),
            PatternStep::State(door_closed()),
            PatternStep::Not(NotState::new(od(), Some(5.0))),
        ];
        let history = vec![st(od(), 1.0), st(door_open(), 2.0), st(od(), 3.0), st(door_closed(), 4.0)];
        let (result, _) = find_pattern(&pattern, &history, 4.0);
        assert_eq!(result, PatternMatch::PartialMatch);
    }

    // Scenario 5: same plus (OD, +6) => MATCHED (trailing NotState elapses, no OD
    // arrived during the 5s window after the DC match).
    #[test]
    fn scenario_5_trailing_notstate_elapses() {
        let pattern = vec![
            PatternStep::State(od()),
            PatternStep::State(door_open()),
            PatternStep::State(door_closed()),
            PatternStep::Not(NotState::new(od(), Some(5.0))),
        ];
        let history = vec![
            st(od(), 1.0),
            st(door_open(), 2.0),
            st(od(), 3.0),
            st(door_closed(), 4.0),
            st(od(), 10.0),
        ];
        let (result, _) = find_pattern(&pattern, &history, 10.0);
        assert_eq!(result, PatternMatch::Matched);
    }

    #[test]
    fn empty_history_is_not_matched() {
        let pattern = vec![PatternStep::State(door_open())];
        let (result, wanted) = find_pattern(&pattern, &[], 0.0);
        assert_eq!(result, PatternMatch::NotMatched);
        assert!(wanted.is_empty());
    }

    // P1/I1: add_to_state_history maintains ts ordering regardless of
    // insertion order.
    #[test]
    fn add_to_state_history_keeps_ts_sorted() {
        let pd = PatternDetector::new(vec![], 20.0, 300.0);
        pd.add_to_state_history(st(mo(), 5.0), false);
        pd.add_to_state_history(st(mi(), 1.0), false);
        pd.add_to_state_history(st(nm(), 3.0), false);
        let snapshot = pd.state_history_snapshot();
        let timestamps: Vec<f64> = snapshot.iter().map(|s| s.ts).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(timestamps, sorted);
    }

    // P2/I2: avoid_duplicates refuses a second insertion of the same
    // state immediately preceding the insertion point.
    #[test]
    fn add_to_state_history_dedups_adjacent_same_state() {
        let pd = PatternDetector::new(vec![], 20.0, 300.0);
        assert!(pd.add_to_state_history(st(door_open(), 1.0), true));
        assert!(!pd.add_to_state_history(st(door_open(), 2.0), true));
        assert!(pd.add_to_state_history(st(door_closed(), 3.0), true));
        assert_eq!(pd.state_history_snapshot().len(), 2);
    }

    // P3/I3: pruning with no partial match uses the short window.
    #[test]
    fn prune_short_window_drops_old_steps() {
        let pd = PatternDetector::new(vec![], 10.0, 300.0);
        pd.add_to_state_history(st(door_open(), 0.0), false);
        pd.add_to_state_history(st(door_closed(), 50.0), false);
        pd.prune(50.0);
        let snapshot = pd.state_history_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, door_closed());
    }

    #[test]
    fn states_in_demand_reports_next_wanted_state() {
        let pattern = Pattern {
            id: "test".to_string(),
            steps: vec![PatternStep::State(door_open()), PatternStep::State(od())],
        };
        let pd = PatternDetector::new(vec![pattern], 20.0, 300.0);
        pd.add_to_state_history(st(door_open(), 1.0), false);
        let demand = pd.states_in_demand(1.0);
        assert!(demand.contains(&od()));
    }

    // L3: a MATCHED history stays MATCHED under extension, outside the
    // documented trailing-NotState exception (scenario 1's pattern has no
    // trailing NotState).
    #[test]
    fn scenario_1_extension_stays_matched() {
        let pattern = vec![
            PatternStep::State(mo()),
            PatternStep::State(door_open()),
            PatternStep::State(door_closed()),
        ];
        let mut history = vec![
            st(mi(), 1.0),
            st(mi(), 2.0),
            st(mo(), 3.0),
            st(mi(), 4.0),
            st(door_open(), 5.0),
            st(mi(), 6.0),
            st(door_closed(), 7.0),
            st(mi(), 8.0),
        ];
        let (before, _) = find_pattern(&pattern, &history, 8.0);
        assert_eq!(before, PatternMatch::Matched);

        history.push(st(nm(), 9.0));
        history.push(st(mi(), 12.0));
        let (after, _) = find_pattern(&pattern, &history, 12.0);
        assert_eq!(after, PatternMatch::Matched);
    }

    // P5: min_committed_offset is non-decreasing as registered sources only
    // advance their offsets.
    #[test]
    fn min_committed_offset_is_non_decreasing() {
        use std::sync::atomic::{AtomicU64, Ordering};

        struct Advancing(AtomicU64);
        impl CommittedOffsetSource for Advancing {
            fn latest_committed_offset(&self) -> CommittedOffset {
                CommittedOffset::At(self.0.load(Ordering::SeqCst) as f64)
            }
        }

        let a = std::sync::Arc::new(Advancing(AtomicU64::new(1)));
        let b = std::sync::Arc::new(Advancing(AtomicU64::new(5)));
        let sources: Vec<std::sync::Arc<dyn CommittedOffsetSource>> = vec![a.clone(), b.clone()];

        let CommittedOffset::At(first) = min_committed_offset(&sources) else {
            panic!("expected a committed offset");
        };
        assert_eq!(first, 1.0);

        a.0.store(3, Ordering::SeqCst);

        let CommittedOffset::At(second) = min_committed_offset(&sources) else {
            panic!("expected a committed offset");
        };
        assert!(second >= first);
    }

    // Scenario 6: an end-to-end door-enter-then-exit sequence produces two
    // independent PATTERN_DETECTED events, one per configured sub-pattern.
    #[test]
    fn scenario_6_two_subpatterns_matched_in_order() {
        let entering = Pattern {
            id: "PERSON_ENTERING_DOOR".to_string(),
            steps: vec![
                PatternStep::State(door_open()),
                PatternStep::State(od()),
                PatternStep::State(door_closed()),
            ],
        };
        let exiting = Pattern {
            id: "PERSON_EXITING_DOOR".to_string(),
            steps: vec![
                PatternStep::State(od()),
                PatternStep::State(door_open()),
                PatternStep::State(door_closed()),
                PatternStep::Not(NotState::new(od(), Some(5.0))),
            ],
        };
        let pd = PatternDetector::new(vec![entering, exiting], 20.0, 300.0);

        pd.add_to_state_history(st(door_open(), 1.0), false);
        pd.add_to_state_history(st(od(), 2.0), false);
        pd.add_to_state_history(st(door_closed(), 3.0), false);
        let first_pass = pd.evaluate_at(3.0);
        assert_eq!(first_pass.len(), 1);
        assert_eq!(first_pass[0].pattern_id, "PERSON_ENTERING_DOOR");

        pd.add_to_state_history(st(od(), 4.0), false);
        pd.add_to_state_history(st(door_open(), 5.0), false);
        pd.add_to_state_history(st(door_closed(), 6.0), false);
        let second_pass = pd.evaluate_at(12.0);
        assert_eq!(second_pass.len(), 1);
        assert_eq!(second_pass[0].pattern_id, "PERSON_EXITING_DOOR");
    }

    // "Person entering": door opens, a person appears inside the mask, door
    // closes ⇒ exactly one PERSON_ENTERING_DOOR.
    #[test]
    fn fixture_person_entering() {
        let pattern = Pattern {
            id: "PERSON_ENTERING_DOOR".to_string(),
            steps: vec![
                PatternStep::State(door_open()),
                PatternStep::State(od()),
                PatternStep::State(door_closed()),
            ],
        };
        let pd = PatternDetector::new(vec![pattern], 20.0, 300.0);
        pd.add_to_state_history(st(door_open(), 1.0), false);
        pd.add_to_state_history(st(mi(), 1.5), false);
        pd.add_to_state_history(st(od(), 2.0), false);
        pd.add_to_state_history(st(door_closed(), 3.0), false);

        let detections = pd.evaluate_at(3.0);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].pattern_id, "PERSON_ENTERING_DOOR");
    }

    // "Person exiting": a person appears first, door opens, door closes, no
    // more detections for 5+ s ⇒ exactly one PERSON_EXITING_DOOR.
    #[test]
    fn fixture_person_exiting() {
        let pattern = Pattern {
            id: "PERSON_EXITING_DOOR".to_string(),
            steps: vec![
                PatternStep::State(od()),
                PatternStep::State(door_open()),
                PatternStep::State(door_closed()),
                PatternStep::Not(NotState::new(od(), Some(5.0))),
            ],
        };
        let pd = PatternDetector::new(vec![pattern], 20.0, 300.0);
        pd.add_to_state_history(st(od(), 1.0), false);
        pd.add_to_state_history(st(door_open(), 2.0), false);
        pd.add_to_state_history(st(door_closed(), 3.0), false);

        let too_soon = pd.evaluate_at(4.0);
        assert!(too_soon.is_empty());

        let after_quiet_period = pd.evaluate_at(9.0);
        assert_eq!(after_quiet_period.len(), 1);
        assert_eq!(after_quiet_period[0].pattern_id, "PERSON_EXITING_DOOR");
    }

    // "Visit": person → door opens → door closes → person ⇒ exactly one
    // PERSON_VISITED_AT_DOOR.
    #[test]
    fn fixture_visit() {
        let pattern = Pattern {
            id: "PERSON_VISITED_AT_DOOR".to_string(),
            steps: vec![
                PatternStep::State(od()),
                PatternStep::State(door_open()),
                PatternStep::State(door_closed()),
                PatternStep::State(od()),
            ],
        };
        let pd = PatternDetector::new(vec![pattern], 20.0, 300.0);
        pd.add_to_state_history(st(od(), 1.0), false);
        pd.add_to_state_history(st(door_open(), 2.0), false);
        pd.add_to_state_history(st(door_closed(), 3.0), false);
        pd.add_to_state_history(st(od(), 4.0), false);

        let detections = pd.evaluate_at(4.0);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].pattern_id, "PERSON_VISITED_AT_DOOR");
    }
}
