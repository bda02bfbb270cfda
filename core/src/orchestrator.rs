//! SPDX-License-Identifier: GPL-3.0-or-later

//! Stream orchestrator (spec §4.10, C10). Wires C1-C9, drives the
//! top-level loop, and owns the shutdown sequence.

use crate::broker::Broker;
use crate::detectors::door::{DoorStateDetector, Rect};
use crate::detectors::motion::{MotionConfig, MotionDetector};
use crate::detectors::object::ObjectTask;
use crate::frame::Frame;
use crate::frame_source::FrameSource;
use crate::notification::Notification;
use crate::notifier::Notifier;
use crate::pattern::PatternDetector;
use crate::queue::{DropOldestQueue, Queue};
use crate::state::{DoorState, MotionState};
use crate::state_managers::{DoorStateManager, MotionStateManager};
use image::imageops::crop_imm;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Spawns a dedicated sleeping thread that fires pattern evaluation at
/// interval `Δ` (spec §5 "A repeating-timer thread fires pattern
/// evaluation", §9 "Coroutines/callbacks: a thread, not a scheduled
/// callback").
struct PatternTimer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PatternTimer {
    fn start(detector: Arc<PatternDetector>, broker_queue: Arc<dyn Queue<Notification>>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_for_thread.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if stop_for_thread.load(Ordering::Relaxed) {
                    break;
                }
                forward_detections(detector.detect_patterns(), &broker_queue);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Runs one final evaluation at `ts = +inf` and joins the thread
    /// (spec §4.10 shutdown step 4 + 6).
    fn stop_and_flush(mut self, detector: &PatternDetector, broker_queue: &Arc<dyn Queue<Notification>>) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        forward_detections(detector.flush(), broker_queue);
    }
}

fn forward_detections(detections: Vec<crate::pattern::PatternDetection>, broker_queue: &Arc<dyn Queue<Notification>>) {
    for d in detections {
        info!("pattern matched: {}", d.pattern_id);
        broker_queue.enqueue(Notification::PatternDetected {
            pattern_id: d.pattern_id,
            attrs: d.attrs,
        });
    }
}

fn motion_state_of(motion_outside: Option<bool>) -> MotionState {
    match motion_outside {
        None => MotionState::None,
        Some(true) => MotionState::OutsideMask,
        Some(false) => MotionState::InsideMask,
    }
}

fn crop_frame(frame: &Frame, rect: &Rect) -> (image::RgbImage, (i32, i32)) {
    let w = rect.xmax.saturating_sub(rect.xmin).max(1);
    let h = rect.ymax.saturating_sub(rect.ymin).max(1);
    let cropped = crop_imm(frame.rgb.as_ref(), rect.xmin, rect.ymin, w, h).to_image();
    (cropped, (rect.xmin as i32, rect.ymin as i32))
}

pub struct OrchestratorConfig {
    pub md_fps: f64,
    pub motion: MotionConfig,
    pub pattern_interval: Duration,
}

/// Owns the main-loop thread and every spawned worker thread (spec §4.10,
/// §5 "Each long-running component owns exactly one worker thread").
pub struct Orchestrator {
    frame_source: Arc<FrameSource>,
    od_queue: Arc<dyn Queue<ObjectTask>>,
    broker_queue: Arc<dyn Queue<Notification>>,
    notifier_queue: Arc<dyn Queue<Notification>>,
    display: Arc<DropOldestQueue<Option<Frame>>>,
    pattern_detector: Arc<PatternDetector>,
    door_manager: Arc<DoorStateManager>,
    motion_manager: Arc<MotionStateManager>,
    door_detector: Option<Mutex<Box<dyn DoorStateDetector>>>,
    motion_detector: Mutex<MotionDetector>,
    config: OrchestratorConfig,
    running: Arc<AtomicBool>,
    main_handle: Mutex<Option<JoinHandle<()>>>,
    broker_handle: Mutex<Option<JoinHandle<()>>>,
    notifier_handle: Mutex<Option<JoinHandle<()>>>,
    pattern_timer: Mutex<Option<PatternTimer>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frame_source: Arc<FrameSource>,
        od_queue: Arc<dyn Queue<ObjectTask>>,
        broker_queue: Arc<dyn Queue<Notification>>,
        notifier_queue: Arc<dyn Queue<Notification>>,
        display_capacity: usize,
        pattern_detector: Arc<PatternDetector>,
        door_manager: Arc<DoorStateManager>,
        motion_manager: Arc<MotionStateManager>,
        door_detector: Option<Box<dyn DoorStateDetector>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            frame_source,
            od_queue,
            broker_queue,
            notifier_queue,
            display: Arc::new(DropOldestQueue::new(display_capacity)),
            pattern_detector,
            door_manager,
            motion_manager,
            door_detector: door_detector.map(Mutex::new),
            motion_detector: Mutex::new(MotionDetector::new()),
            config,
            running: Arc::new(AtomicBool::new(false)),
            main_handle: Mutex::new(None),
            broker_handle: Mutex::new(None),
            notifier_handle: Mutex::new(None),
            pattern_timer: Mutex::new(None),
        }
    }

    pub fn display_queue(&self) -> Arc<DropOldestQueue<Option<Frame>>> {
        Arc::clone(&self.display)
    }

    /// Blocks until the main loop exits on its own (source exhaustion),
    /// without running the shutdown sequence. Callers that drive a
    /// finite source (e.g. `VIDEO_FILE`) call this, then `stop()`.
    pub fn wait_until_source_exhausted(&self) {
        let handle = self.main_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Starts the broker, notifier, pattern timer, and the main loop,
    /// each on its own thread. Idempotent: a second call while already
    /// running is a no-op (spec §5 "ShutdownRace").
    pub fn start(self: &Arc<Self>, broker: Broker, notifier: Notifier) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("orchestrator already running, ignoring start()");
            return;
        }

        *self.broker_handle.lock().unwrap() = Some(std::thread::spawn(move || broker.run()));
        *self.notifier_handle.lock().unwrap() = Some(std::thread::spawn(move || notifier.run()));
        *self.pattern_timer.lock().unwrap() = Some(PatternTimer::start(
            Arc::clone(&self.pattern_detector),
            Arc::clone(&self.broker_queue),
            self.config.pattern_interval,
        ));

        let this = Arc::clone(self);
        *self.main_handle.lock().unwrap() = Some(std::thread::spawn(move || this.main_loop()));
    }

    fn main_loop(&self) {
        let mut limiter = crate::limiter::FrameLimiter::new(self.config.md_fps);
        loop {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            let Some(frame) = self.frame_source.read() else {
                info!("frame source exhausted, stopping main loop");
                break;
            };
            limiter.tick();

            let motion_result = {
                let mut md = self.motion_detector.lock().unwrap();
                md.process(frame.rgb.as_ref(), &self.config.motion)
            };

            let now = frame.ts;
            if let Some(detector) = &self.door_detector {
                let door_state = detector.lock().unwrap().detect(&frame);
                self.door_manager.add_state(door_state, now);
            }
            self.motion_manager
                .add_state(motion_state_of(motion_result.motion_outside), now);

            if let Some(rect) = &motion_result.crop {
                let (crop, offset) = crop_frame(&frame, rect);
                self.od_queue.enqueue(ObjectTask {
                    crop,
                    crop_offset: offset,
                    ts: now,
                });
            }

            // spec §4.10 step 5: publish the annotated frame, not the raw one.
            self.display.enqueue(Some(Frame::new(motion_result.annotated, now)));
        }
    }

    /// Spec §4.10 shutdown sequence, steps 1-6.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // 1. stop frame source; drain its queue.
        self.frame_source.stop();

        // 2. stop orchestrator thread.
        if let Some(handle) = self.main_handle.lock().unwrap().take() {
            let _ = handle.join();
        }

        // 3. wait for the object-detector input queue to empty, then
        // unblock its worker thread.
        self.od_queue.wait_for_empty(Duration::from_secs(30));
        self.od_queue.abrupt_stop(ObjectTask::sentinel());

        // 4. terminal flush evaluation + 6. stop pattern detector timer.
        if let Some(timer) = self.pattern_timer.lock().unwrap().take() {
            timer.stop_and_flush(&self.pattern_detector, &self.broker_queue);
        }

        // 5. drain broker and notifier queues.
        self.broker_queue.abrupt_stop(Notification::Stop);
        if let Some(handle) = self.broker_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.notifier_queue.abrupt_stop(Notification::Stop);
        if let Some(handle) = self.notifier_handle.lock().unwrap().take() {
            let _ = handle.join();
        }

        // 6. stop broker (joined above already counts as stopped).
        info!("orchestrator shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::{RawFrameProducer, SourceMode};
    use crate::notifier::LoggingSink;
    use crate::queue::BlockingQueue;
    use crate::state_managers::ObjectDetectorHandle;
    use std::collections::VecDeque;

    struct FiniteProducer(VecDeque<Frame>);
    impl RawFrameProducer for FiniteProducer {
        fn next_frame(&mut self) -> Option<Frame> {
            self.0.pop_front()
        }
    }

    fn tiny_frame(ts: f64) -> Frame {
        Frame::new(image::RgbImage::new(4, 4), ts)
    }

    #[test]
    fn orchestrator_drains_source_and_shuts_down_cleanly() {
        let producer = FiniteProducer(vec![tiny_frame(1.0), tiny_frame(2.0)].into());
        let source = Arc::new(FrameSource::start(SourceMode::InSync, 4, 0.0, Box::new(producer)));

        let od_queue: Arc<dyn Queue<ObjectTask>> = Arc::new(BlockingQueue::new(4));
        let broker_queue: Arc<dyn Queue<Notification>> = Arc::new(BlockingQueue::new(8));
        let notifier_queue: Arc<dyn Queue<Notification>> = Arc::new(BlockingQueue::new(8));

        let pattern_detector = Arc::new(PatternDetector::new(vec![], 20.0, 300.0));
        let door_manager = Arc::new(DoorStateManager::new(pattern_detector.clone(), broker_queue.clone()));
        let motion_manager = Arc::new(MotionStateManager::new(pattern_detector.clone(), broker_queue.clone()));
        let handle = Arc::new(ObjectDetectorHandle::default());
        let osm = Arc::new(crate::state_managers::ObjectStateManager::new(pattern_detector.clone(), handle));

        let config = OrchestratorConfig {
            md_fps: 0.0,
            motion: MotionConfig::default(),
            pattern_interval: Duration::from_millis(50),
        };

        let orchestrator = Arc::new(Orchestrator::new(
            source,
            od_queue,
            broker_queue.clone(),
            notifier_queue.clone(),
            4,
            pattern_detector,
            door_manager,
            motion_manager,
            None,
            config,
        ));

        let broker = Broker::new(broker_queue.clone(), notifier_queue.clone(), osm, true);
        let notifier = Notifier::new(notifier_queue.clone(), Arc::new(LoggingSink), Default::default());

        orchestrator.start(broker, notifier);
        std::thread::sleep(Duration::from_millis(200));
        orchestrator.stop();

        assert_eq!(broker_queue.size(), 0);
    }

    // L1: stop() called twice has the same observable effect as once.
    #[test]
    fn stop_is_idempotent() {
        let producer = FiniteProducer(vec![tiny_frame(1.0)].into());
        let source = Arc::new(FrameSource::start(SourceMode::InSync, 4, 0.0, Box::new(producer)));

        let od_queue: Arc<dyn Queue<ObjectTask>> = Arc::new(BlockingQueue::new(4));
        let broker_queue: Arc<dyn Queue<Notification>> = Arc::new(BlockingQueue::new(8));
        let notifier_queue: Arc<dyn Queue<Notification>> = Arc::new(BlockingQueue::new(8));

        let pattern_detector = Arc::new(PatternDetector::new(vec![], 20.0, 300.0));
        let door_manager = Arc::new(DoorStateManager::new(pattern_detector.clone(), broker_queue.clone()));
        let motion_manager = Arc::new(MotionStateManager::new(pattern_detector.clone(), broker_queue.clone()));
        let handle = Arc::new(ObjectDetectorHandle::default());
        let osm = Arc::new(crate::state_managers::ObjectStateManager::new(pattern_detector.clone(), handle));

        let config = OrchestratorConfig {
            md_fps: 0.0,
            motion: MotionConfig::default(),
            pattern_interval: Duration::from_millis(50),
        };

        let orchestrator = Arc::new(Orchestrator::new(
            source,
            od_queue,
            broker_queue.clone(),
            notifier_queue.clone(),
            4,
            pattern_detector,
            door_manager,
            motion_manager,
            None,
            config,
        ));

        let broker = Broker::new(broker_queue.clone(), notifier_queue.clone(), osm, true);
        let notifier = Notifier::new(notifier_queue.clone(), Arc::new(LoggingSink), Default::default());

        orchestrator.start(broker, notifier);
        std::thread::sleep(Duration::from_millis(100));
        orchestrator.stop();
        let after_first = broker_queue.size();
        orchestrator.stop();
        assert_eq!(broker_queue.size(), after_first);
    }
}
