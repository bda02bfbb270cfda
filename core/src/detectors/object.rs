//! SPDX-License-Identifier: GPL-3.0-or-later

//! Object detector worker (spec §4.5, C5). The neural-network inference
//! backend is an out-of-scope collaborator; [`ModelBackend`] is the
//! black-box contract this worker depends on.

use crate::detectors::door::Rect;
use crate::frame::DetectionBox;
use crate::limiter::FrameLimiter;
use crate::notification::Notification;
use crate::queue::{DropOldestQueue, Queue};
use crate::skip_ahead::SkipAheadOptimizer;
use crate::state_managers::ObjectDetectorHandle;
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;
use log::debug;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The opaque neural detector contract: crop in, raw boxes out. Real
/// backends (ONNX Runtime via `ort`, feature-gated) implement this; tests
/// use a canned stand-in.
pub trait ModelBackend: Send + Sync {
    fn infer(&self, crop: &RgbImage) -> Result<Vec<DetectionBox>>;
}

/// Filters applied in order to raw model output (spec §4.5 step 4).
#[derive(Debug, Clone)]
pub struct DetectionFilters {
    pub score_threshold: f32,
    pub allowed_labels: Option<Vec<String>>,
    pub min_width: i32,
    pub min_height: i32,
    pub positive_masks: Vec<Rect>,
    pub negative_masks: Vec<Rect>,
}

impl DetectionFilters {
    fn passes(&self, b: &DetectionBox) -> bool {
        if b.score < self.score_threshold {
            return false;
        }
        if let Some(labels) = &self.allowed_labels {
            if !labels.iter().any(|l| l == &b.label) {
                return false;
            }
        }
        if b.width() < self.min_width || b.height() < self.min_height {
            return false;
        }
        let rect = Rect {
            xmin: b.xmin.max(0) as u32,
            ymin: b.ymin.max(0) as u32,
            xmax: b.xmax.max(0) as u32,
            ymax: b.ymax.max(0) as u32,
        };
        if !self.positive_masks.is_empty()
            && !self
                .positive_masks
                .iter()
                .all(|m| rect.xmin >= m.xmin && rect.ymin >= m.ymin && rect.xmax <= m.xmax && rect.ymax <= m.ymax)
        {
            return false;
        }
        for m in &self.negative_masks {
            if rect.xmin >= m.xmin && rect.ymin >= m.ymin && rect.xmax <= m.xmax && rect.ymax <= m.ymax {
                return false;
            }
        }
        true
    }
}

struct BufferEntry {
    ts_ms: i64,
    label: String,
    score: f32,
    image_path: String,
}

/// Sliding-window aggregator (spec §3 "DetectionBuffer entry", §4.5).
/// Votes the label with the maximum *cumulative* (summed, not averaged)
/// score once at least `threshold` entries are present.
pub struct DetectionBuffer {
    window_ms: i64,
    threshold: usize,
    entries: Vec<BufferEntry>,
}

impl DetectionBuffer {
    pub fn new(window_ms: i64, threshold: usize) -> Self {
        Self {
            window_ms,
            threshold,
            entries: Vec::new(),
        }
    }

    fn trim(&mut self, now_ms: i64) {
        self.entries.retain(|e| now_ms - e.ts_ms <= self.window_ms);
    }

    pub fn add(&mut self, b: &DetectionBox, image_path: String, ts_ms: i64) {
        self.entries.push(BufferEntry {
            ts_ms,
            label: b.label.clone(),
            score: b.score,
            image_path,
        });
        self.trim(ts_ms);
    }

    /// `(label, cumulative_score, image_path)` of the max single-score
    /// entry for the winning label, or `None` below threshold (spec
    /// §4.5 "Rationale: a single high-confidence outlier should not
    /// outvote a consistent weaker stream").
    pub fn best_in_window(&self) -> Option<(String, f32, String)> {
        if self.entries.len() < self.threshold {
            return None;
        }
        use std::collections::HashMap;
        let mut cumulative: HashMap<&str, f32> = HashMap::new();
        let mut best_path: HashMap<&str, (&str, f32)> = HashMap::new();
        for e in &self.entries {
            *cumulative.entry(e.label.as_str()).or_insert(0.0) += e.score;
            let entry = best_path.entry(e.label.as_str()).or_insert((e.image_path.as_str(), e.score));
            if e.score > entry.1 {
                *entry = (e.image_path.as_str(), e.score);
            }
        }
        cumulative
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(label, sum)| {
                let path = best_path[label].0.to_string();
                (label.to_string(), sum, path)
            })
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// `(frame, crop, crop_offset, ts)` — one task on the object detector's
/// own bounded queue (spec §4.5).
#[derive(Clone)]
pub struct ObjectTask {
    pub crop: RgbImage,
    pub crop_offset: (i32, i32),
    pub ts: f64,
}

const STOP_SENTINEL_TS: f64 = f64::NEG_INFINITY;

impl ObjectTask {
    pub fn sentinel() -> Self {
        Self {
            crop: RgbImage::new(1, 1),
            crop_offset: (0, 0),
            ts: STOP_SENTINEL_TS,
        }
    }

    fn is_sentinel(&self) -> bool {
        self.ts == STOP_SENTINEL_TS
    }
}

pub struct ObjectDetectorWorkerConfig {
    pub fps: f64,
    pub output_dir: std::path::PathBuf,
    pub write_jpeg: bool,
    pub write_xml: bool,
}

/// Draws `box_in_crop` (crop-local coordinates) onto a copy of `crop` for
/// the intermediate-frame singleton (spec §4.5 step 5).
fn draw_intermediate(crop: &RgbImage, box_in_crop: &Rect) -> RgbImage {
    let mut annotated = crop.clone();
    draw_hollow_rect_mut(
        &mut annotated,
        DrawRect::at(box_in_crop.xmin as i32, box_in_crop.ymin as i32)
            .of_size(box_in_crop.width().max(1), box_in_crop.height().max(1)),
        Rgb([255, 0, 0]),
    );
    annotated
}

/// Single worker thread loop (spec §4.5 "Loop contract"). Emits
/// `OBJECT_DETECTED` directly onto the broker queue (spec §4.5 step 6);
/// the broker is responsible for routing it into the object state
/// manager (spec §4.9).
pub struct ObjectDetectorWorker {
    input: Arc<dyn Queue<ObjectTask>>,
    model: Arc<dyn ModelBackend>,
    filters: DetectionFilters,
    skip_ahead: Arc<dyn SkipAheadOptimizer>,
    handle: Arc<ObjectDetectorHandle>,
    broker_queue: Arc<dyn Queue<Notification>>,
    buffer: DetectionBuffer,
    limiter: FrameLimiter,
    config: ObjectDetectorWorkerConfig,
    /// Drop-oldest singleton of annotated crops for HTTP video viewers
    /// (spec §4.5 step 5, an out-of-scope collaborator downstream).
    od_display: Arc<DropOldestQueue<Option<RgbImage>>>,
}

impl ObjectDetectorWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input: Arc<dyn Queue<ObjectTask>>,
        model: Arc<dyn ModelBackend>,
        filters: DetectionFilters,
        skip_ahead: Arc<dyn SkipAheadOptimizer>,
        handle: Arc<ObjectDetectorHandle>,
        broker_queue: Arc<dyn Queue<Notification>>,
        buffer: DetectionBuffer,
        config: ObjectDetectorWorkerConfig,
    ) -> Self {
        let limiter = FrameLimiter::new(config.fps);
        Self {
            input,
            model,
            filters,
            skip_ahead,
            handle,
            broker_queue,
            buffer,
            limiter,
            config,
            od_display: Arc::new(DropOldestQueue::new(1)),
        }
    }

    /// Handle to the intermediate-frame singleton, for an HTTP viewer (or
    /// a test) to read from.
    pub fn display_queue(&self) -> Arc<DropOldestQueue<Option<RgbImage>>> {
        Arc::clone(&self.od_display)
    }

    /// Runs until a sentinel task is dequeued. Intended to be spawned on
    /// its own thread by the orchestrator.
    pub fn run(&mut self) {
        loop {
            let task = self.input.dequeue();
            if task.is_sentinel() {
                break;
            }
            self.handle_task(task);
        }
    }

    fn handle_task(&mut self, task: ObjectTask) {
        if self.skip_ahead.skip_task(task.ts) {
            self.handle.set_committed_offset(task.ts);
            return;
        }

        self.limiter.tick();

        let boxes = match self.model.infer(&task.crop) {
            Ok(boxes) => boxes,
            Err(e) => {
                debug!("inference failed: {e}");
                self.handle.set_committed_offset(task.ts);
                return;
            }
        };

        for raw in boxes {
            let translated = DetectionBox {
                xmin: raw.xmin + task.crop_offset.0,
                ymin: raw.ymin + task.crop_offset.1,
                xmax: raw.xmax + task.crop_offset.0,
                ymax: raw.ymax + task.crop_offset.1,
                label: raw.label,
                score: raw.score,
            };
            if !self.filters.passes(&translated) {
                debug!("detection box {:?} dropped by filters", translated);
                continue;
            }

            let image_path = crate::frame::detection_image_path(&self.config.output_dir, &translated.label, task.ts);
            if self.config.write_jpeg {
                crate::frame::save_detection_jpeg(task.crop.clone(), image_path.clone());
            }
            if self.config.write_xml {
                let xml = crate::frame::voc_xml(
                    &image_path.to_string_lossy(),
                    task.crop.width(),
                    task.crop.height(),
                    std::slice::from_ref(&translated),
                );
                crate::frame::save_detection_xml(xml, image_path.with_extension("xml"));
            }

            self.buffer.add(&translated, image_path.to_string_lossy().to_string(), now_ms());

            let local_box = Rect {
                xmin: (translated.xmin - task.crop_offset.0).max(0) as u32,
                ymin: (translated.ymin - task.crop_offset.1).max(0) as u32,
                xmax: (translated.xmax - task.crop_offset.0).max(0) as u32,
                ymax: (translated.ymax - task.crop_offset.1).max(0) as u32,
            };
            self.od_display.enqueue(Some(draw_intermediate(&task.crop, &local_box)));
        }

        if let Some((label, score, image_path)) = self.buffer.best_in_window() {
            self.broker_queue.enqueue(Notification::ObjectDetected {
                label,
                score,
                image_path,
                ts: task.ts,
            });
        }

        self.handle.set_committed_offset(task.ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_buffer_returns_none_below_threshold() {
        let mut buf = DetectionBuffer::new(5000, 3);
        buf.add(
            &DetectionBox {
                xmin: 0,
                ymin: 0,
                xmax: 10,
                ymax: 10,
                label: "person".into(),
                score: 0.9,
            },
            "a.jpg".into(),
            1000,
        );
        assert!(buf.best_in_window().is_none());
    }

    #[test]
    fn detection_buffer_sums_scores_not_averages() {
        let mut buf = DetectionBuffer::new(5000, 2);
        let weak = DetectionBox {
            xmin: 0,
            ymin: 0,
            xmax: 10,
            ymax: 10,
            label: "dog".into(),
            score: 0.3,
        };
        let outlier = DetectionBox {
            xmin: 0,
            ymin: 0,
            xmax: 10,
            ymax: 10,
            label: "cat".into(),
            score: 0.99,
        };
        buf.add(&weak, "d1.jpg".into(), 1000);
        buf.add(&weak, "d2.jpg".into(), 1100);
        buf.add(&outlier, "c1.jpg".into(), 1200);
        // dog: 0.3+0.3=0.6 beats a single 0.99 cat outlier.
        let (label, sum, _) = buf.best_in_window().unwrap();
        assert_eq!(label, "dog");
        assert!((sum - 0.6).abs() < 1e-6);
    }

    #[test]
    fn detection_buffer_trims_entries_outside_window() {
        let mut buf = DetectionBuffer::new(1000, 1);
        let b = DetectionBox {
            xmin: 0,
            ymin: 0,
            xmax: 10,
            ymax: 10,
            label: "person".into(),
            score: 0.5,
        };
        buf.add(&b, "a.jpg".into(), 0);
        buf.add(&b, "b.jpg".into(), 5000);
        assert_eq!(buf.entries.len(), 1);
    }

    #[test]
    fn filters_reject_low_score_and_disallowed_labels() {
        let filters = DetectionFilters {
            score_threshold: 0.5,
            allowed_labels: Some(vec!["person".into()]),
            min_width: 0,
            min_height: 0,
            positive_masks: vec![],
            negative_masks: vec![],
        };
        let low_score = DetectionBox {
            xmin: 0,
            ymin: 0,
            xmax: 10,
            ymax: 10,
            label: "person".into(),
            score: 0.2,
        };
        let wrong_label = DetectionBox {
            score: 0.9,
            label: "dog".into(),
            ..low_score.clone()
        };
        assert!(!filters.passes(&low_score));
        assert!(!filters.passes(&wrong_label));
    }
}
