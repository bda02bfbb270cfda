//! SPDX-License-Identifier: GPL-3.0-or-later

//! State managers (spec §4.6, C6): translate producer outputs into
//! deduplicated `StateHistoryStep` insertions and expose a commit
//! watermark the pattern detector can wait on.

use crate::notification::Notification;
use crate::pattern::{CommittedOffset, CommittedOffsetSource, PatternDetector};
use crate::queue::Queue;
use crate::state::{DoorState, MotionState, ObjectAttrs, ObjectState, State, StateHistoryStep};
use log::info;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared contract across the three concrete managers (spec §4.6, §9
/// "Dynamic dispatch and inheritance").
pub trait StateManager: CommittedOffsetSource {
    fn get_current_lag(&self) -> usize;
}

/// Suppresses identical-to-previous insertion, the common shape shared by
/// the door and motion managers.
struct LastState {
    last: Mutex<Option<State>>,
}

impl LastState {
    fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Returns `true` if `state` differs from the last one seen, and
    /// records it as the new last.
    fn advance(&self, state: State) -> bool {
        let mut last = self.last.lock().unwrap();
        if *last == Some(state) {
            false
        } else {
            *last = Some(state);
            true
        }
    }
}

/// Door-state manager (spec §4.6 "Door"). Enqueues its own
/// `DOOR_STATE_CHANGED` notification directly onto the broker queue.
pub struct DoorStateManager {
    detector: Arc<PatternDetector>,
    broker_queue: Arc<dyn Queue<Notification>>,
    last: LastState,
}

impl DoorStateManager {
    pub fn new(detector: Arc<PatternDetector>, broker_queue: Arc<dyn Queue<Notification>>) -> Self {
        Self {
            detector,
            broker_queue,
            last: LastState::new(),
        }
    }

    pub fn add_state(&self, state: DoorState, ts: f64) {
        if !self.last.advance(State::Door(state)) {
            return;
        }
        let step = StateHistoryStep::new(State::Door(state), ts);
        self.detector.add_to_state_history(step.clone(), false);
        info!("door state changed: {step}");
        self.broker_queue.enqueue(Notification::DoorStateChanged(state));
    }
}

impl CommittedOffsetSource for DoorStateManager {
    fn latest_committed_offset(&self) -> CommittedOffset {
        CommittedOffset::Current
    }
}

impl StateManager for DoorStateManager {
    fn get_current_lag(&self) -> usize {
        0
    }
}

/// Motion-state manager (spec §4.6 "Motion").
pub struct MotionStateManager {
    detector: Arc<PatternDetector>,
    broker_queue: Arc<dyn Queue<Notification>>,
    last: LastState,
}

impl MotionStateManager {
    pub fn new(detector: Arc<PatternDetector>, broker_queue: Arc<dyn Queue<Notification>>) -> Self {
        Self {
            detector,
            broker_queue,
            last: LastState::new(),
        }
    }

    pub fn add_state(&self, state: MotionState, ts: f64) {
        if !self.last.advance(State::Motion(state)) {
            return;
        }
        let step = StateHistoryStep::new(State::Motion(state), ts);
        self.detector.add_to_state_history(step.clone(), false);
        info!("motion state changed: {step}");
        self.broker_queue.enqueue(Notification::MotionStateChanged(state));
    }
}

impl CommittedOffsetSource for MotionStateManager {
    fn latest_committed_offset(&self) -> CommittedOffset {
        CommittedOffset::Current
    }
}

impl StateManager for MotionStateManager {
    fn get_current_lag(&self) -> usize {
        0
    }
}

/// Shared between the object detector worker (writer) and the object
/// state manager (reader), mirroring the original's
/// `object_state_manager` reaching into `object_detector.latest_committed_offset`
/// directly (spec §4.6 "Object").
#[derive(Default)]
pub struct ObjectDetectorHandle {
    committed_offset_bits: AtomicU64,
    has_committed: std::sync::atomic::AtomicBool,
    input_queue_size: AtomicUsize,
}

impl ObjectDetectorHandle {
    pub fn set_committed_offset(&self, ts: f64) {
        self.committed_offset_bits.store(ts.to_bits(), Ordering::Release);
        self.has_committed.store(true, Ordering::Release);
    }

    pub fn set_input_queue_size(&self, size: usize) {
        self.input_queue_size.store(size, Ordering::Relaxed);
    }

    fn committed_offset(&self) -> CommittedOffset {
        if self.has_committed.load(Ordering::Acquire) {
            CommittedOffset::At(f64::from_bits(self.committed_offset_bits.load(Ordering::Acquire)))
        } else {
            CommittedOffset::Current
        }
    }

    fn input_queue_size(&self) -> usize {
        self.input_queue_size.load(Ordering::Relaxed)
    }
}

/// Object-state manager (spec §4.6 "Object"). Its committed offset and
/// lag forward to the object detector worker via [`ObjectDetectorHandle`] —
/// this is how the pattern detector learns it is "waiting on object
/// detection".
pub struct ObjectStateManager {
    detector: Arc<PatternDetector>,
    handle: Arc<ObjectDetectorHandle>,
}

impl ObjectStateManager {
    pub fn new(detector: Arc<PatternDetector>, handle: Arc<ObjectDetectorHandle>) -> Self {
        Self { detector, handle }
    }

    /// Dedup-by-"last state is OBJECT_DETECTED" (spec §4.6). Called by
    /// the broker when an `OBJECT_DETECTED` notification arrives (spec
    /// §4.9); does not itself enqueue — the broker forwards the
    /// notification downstream unconditionally.
    pub fn add_state(&self, label: &str, score: f32, image_path: &str, ts: f64) -> bool {
        let attrs = ObjectAttrs {
            label: label.to_string(),
            score,
            image_path: image_path.to_string(),
        };
        let step = StateHistoryStep::with_attrs(State::Object(ObjectState::ObjectDetected), ts, attrs);
        let added = self.detector.add_to_state_history(step.clone(), true);
        if added {
            info!("object state changed: {step}");
        }
        added
    }
}

impl CommittedOffsetSource for ObjectStateManager {
    fn latest_committed_offset(&self) -> CommittedOffset {
        self.handle.committed_offset()
    }
}

impl StateManager for ObjectStateManager {
    fn get_current_lag(&self) -> usize {
        self.handle.input_queue_size()
    }
}
