//! SPDX-License-Identifier: GPL-3.0-or-later

//! The data model (spec §3): states, `NotState`, and `StateHistoryStep`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Door-state detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorState {
    Open,
    Closed,
}

/// Motion detector output, relative to the configured "interesting" mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionState {
    InsideMask,
    OutsideMask,
    None,
}

/// Object detector output. There is only one positive state; absence of
/// detection is simply the absence of a step, not a state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectState {
    ObjectDetected,
}

/// A value drawn from one of the three closed enumerations (spec §3 "State").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Door(DoorState),
    Motion(MotionState),
    Object(ObjectState),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Door(DoorState::Open) => write!(f, "DOOR_OPEN"),
            State::Door(DoorState::Closed) => write!(f, "DOOR_CLOSED"),
            State::Motion(MotionState::InsideMask) => write!(f, "MOTION_INSIDE_MASK"),
            State::Motion(MotionState::OutsideMask) => write!(f, "MOTION_OUTSIDE_MASK"),
            State::Motion(MotionState::None) => write!(f, "NO_MOTION"),
            State::Object(ObjectState::ObjectDetected) => write!(f, "OBJECT_DETECTED"),
        }
    }
}

/// Per-observation attributes carried by a `StateHistoryStep`, currently
/// only produced by the object detector (label/score/image path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttrs {
    pub label: String,
    pub score: f32,
    pub image_path: String,
}

/// A pattern-only value: "state `s` has NOT been seen for at least `d`
/// seconds". `duration = None` means "forever" (spec §3 "NotState").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotState {
    pub state: State,
    pub duration: Option<f64>,
}

impl NotState {
    pub fn new(state: State, duration: Option<f64>) -> Self {
        Self { state, duration }
    }

    /// `true` if `ts` predates `reference` by more than the NotState's
    /// window would allow — i.e. the duration has not elapsed.
    pub fn within_window(&self, reference_ts: f64, step_ts: f64) -> bool {
        match self.duration {
            None => true,
            Some(d) => (reference_ts - step_ts).abs() <= d,
        }
    }
}

/// One step of a pattern template: either a concrete state to match, or a
/// negative constraint on a state's recent absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternStep {
    State(State),
    Not(NotState),
}

impl PatternStep {
    pub fn matches(&self, state: &State) -> bool {
        matches!(self, PatternStep::State(s) if s == state)
    }
}

/// `(state, ts, attrs?)` — one entry in the ordered state history (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct StateHistoryStep {
    pub state: State,
    pub ts: f64,
    pub attrs: Option<ObjectAttrs>,
}

impl StateHistoryStep {
    pub fn new(state: State, ts: f64) -> Self {
        Self {
            state,
            ts,
            attrs: None,
        }
    }

    pub fn with_attrs(state: State, ts: f64, attrs: ObjectAttrs) -> Self {
        Self {
            state,
            ts,
            attrs: Some(attrs),
        }
    }
}

impl fmt::Display for StateHistoryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:.2}", self.state, self.ts)
    }
}

/// A named, ordered template of pattern steps (spec §3 "Pattern").
pub type PatternId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub steps: Vec<PatternStep>,
}
