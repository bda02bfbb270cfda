//! SPDX-License-Identifier: GPL-3.0-or-later

//! Frame source (spec §4.2, C2). Exposes a single operation, `read`,
//! backed by a dedicated producer thread that feeds a bounded queue at
//! the source's native rate. The concrete decoders (network stream,
//! camera, file) are out-of-scope collaborators; this module owns the
//! queueing/pacing contract any of them plug into.

use crate::frame::Frame;
use crate::limiter::FrameLimiter;
use crate::queue::{BlockingQueue, DropOldestQueue, Queue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Produces raw frames; returns `None` on end-of-stream. Implemented by
/// whatever decodes the configured `input_mode` (spec §6).
pub trait RawFrameProducer: Send {
    fn next_frame(&mut self) -> Option<Frame>;
}

enum Slot {
    InSync(Arc<BlockingQueue<Option<Frame>>>),
    FreeRun(Arc<DropOldestQueue<Option<Frame>>>),
}

impl Slot {
    fn enqueue(&self, item: Option<Frame>) {
        match self {
            Slot::InSync(q) => q.enqueue(item),
            Slot::FreeRun(q) => q.enqueue(item),
        }
    }

    fn dequeue(&self) -> Option<Frame> {
        match self {
            Slot::InSync(q) => q.dequeue(),
            Slot::FreeRun(q) => q.dequeue(),
        }
    }
}

/// Spec §4.2: "in-sync" blocks the producer (every frame processed, used
/// for file input and tests); "free-run" drops the oldest frame when the
/// consumer lags (network/camera).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    InSync,
    FreeRun,
}

pub struct FrameSource {
    slot: Slot,
    stopped: Arc<AtomicBool>,
}

impl FrameSource {
    /// Spawns the producer thread and returns a handle to the output
    /// queue. `rate` paces the producer loop via `FrameLimiter`.
    pub fn start(mode: SourceMode, capacity: usize, rate: f64, mut producer: Box<dyn RawFrameProducer>) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let slot = match mode {
            SourceMode::InSync => Slot::InSync(Arc::new(BlockingQueue::new(capacity))),
            SourceMode::FreeRun => Slot::FreeRun(Arc::new(DropOldestQueue::new(capacity))),
        };

        let stopped_for_thread = Arc::clone(&stopped);
        let slot_for_thread = match &slot {
            Slot::InSync(q) => ProducerQueue::InSync(Arc::clone(q)),
            Slot::FreeRun(q) => ProducerQueue::FreeRun(Arc::clone(q)),
        };

        std::thread::spawn(move || {
            let mut limiter = FrameLimiter::new(rate);
            loop {
                if stopped_for_thread.load(Ordering::Relaxed) {
                    break;
                }
                limiter.tick();
                match producer.next_frame() {
                    Some(frame) => slot_for_thread.enqueue(Some(frame)),
                    None => {
                        slot_for_thread.enqueue(None);
                        stopped_for_thread.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        Self { slot, stopped }
    }

    /// Returns the next frame, or `None` at end-of-stream.
    pub fn read(&self) -> Option<Frame> {
        if self.stopped.load(Ordering::Relaxed) && self.queue_empty() {
            return None;
        }
        self.slot.dequeue()
    }

    fn queue_empty(&self) -> bool {
        match &self.slot {
            Slot::InSync(q) => q.size() == 0,
            Slot::FreeRun(q) => q.size() == 0,
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.slot.enqueue(None);
    }
}

enum ProducerQueue {
    InSync(Arc<BlockingQueue<Option<Frame>>>),
    FreeRun(Arc<DropOldestQueue<Option<Frame>>>),
}

impl ProducerQueue {
    fn enqueue(&self, item: Option<Frame>) {
        match self {
            ProducerQueue::InSync(q) => q.enqueue(item),
            ProducerQueue::FreeRun(q) => q.enqueue(item),
        }
    }
}
