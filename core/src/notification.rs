//! SPDX-License-Identifier: GPL-3.0-or-later

//! The stable boundary between the core pipeline and the (out-of-scope)
//! notifier transport (spec §6 "Output queue message types", §9
//! "Dynamically typed messages"). A tagged union, not a generic payload.

use crate::state::{DoorState, MotionState, ObjectAttrs};

#[derive(Debug, Clone)]
pub enum Notification {
    ObjectDetected {
        label: String,
        score: f32,
        image_path: String,
        ts: f64,
    },
    PatternDetected {
        pattern_id: String,
        attrs: Option<ObjectAttrs>,
    },
    DoorStateChanged(DoorState),
    MotionStateChanged(MotionState),
    /// Terminates the broker/notifier consumer loops (spec §4.9 "Sentinel
    /// -1 exits the loop").
    Stop,
}
