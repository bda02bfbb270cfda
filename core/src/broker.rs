//! SPDX-License-Identifier: GPL-3.0-or-later

//! The broker (spec §4.9, C9): single consumer thread that fans
//! state-change notifications into the object state manager and forwards
//! every notification to the downstream notifier.

use crate::notification::Notification;
use crate::queue::Queue;
use crate::state_managers::ObjectStateManager;
use log::info;
use std::sync::Arc;

pub struct Broker {
    input: Arc<dyn Queue<Notification>>,
    notifier_queue: Arc<dyn Queue<Notification>>,
    object_state_manager: Arc<ObjectStateManager>,
    pattern_detection_enabled: bool,
}

impl Broker {
    pub fn new(
        input: Arc<dyn Queue<Notification>>,
        notifier_queue: Arc<dyn Queue<Notification>>,
        object_state_manager: Arc<ObjectStateManager>,
        pattern_detection_enabled: bool,
    ) -> Self {
        Self {
            input,
            notifier_queue,
            object_state_manager,
            pattern_detection_enabled,
        }
    }

    /// Runs until the stop sentinel is dequeued. The broker's input is a
    /// blocking-producer queue — it never drops a notification (spec
    /// §4.9 "The broker never drops").
    pub fn run(&self) {
        loop {
            let notification = self.input.dequeue();
            if matches!(notification, Notification::Stop) {
                break;
            }
            self.handle(notification);
        }
    }

    fn handle(&self, notification: Notification) {
        if let Notification::ObjectDetected {
            label,
            score,
            image_path,
            ts,
        } = &notification
        {
            if self.pattern_detection_enabled {
                self.object_state_manager.add_state(label, *score, image_path, *ts);
            }
        }
        if matches!(notification, Notification::PatternDetected { .. }) {
            info!("pattern detected, forwarding to notifier");
        }
        self.notifier_queue.enqueue(notification);
    }
}
