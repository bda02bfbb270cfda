//! SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{Context, Result};
use log::{info, warn};
use patrol_core::broker::Broker;
use patrol_core::config::{Config, DoorStateDetectorConfig, InputMode};
use patrol_core::detectors::door::{AdaptiveDoorStateDetector, DoorStateDetector, FrameDiffDetector, Rect, SingleShotColorDetector};
use patrol_core::detectors::object::{DetectionFilters, ModelBackend, ObjectDetectorWorker, ObjectDetectorWorkerConfig, ObjectTask, DetectionBuffer};
use patrol_core::frame::DetectionBox;
use patrol_core::frame_source::{FrameSource, RawFrameProducer, SourceMode};
use patrol_core::notification::Notification;
use patrol_core::notifier::{LoggingSink, Notifier};
use patrol_core::orchestrator::{Orchestrator, OrchestratorConfig};
use patrol_core::pattern::PatternDetector;
use patrol_core::queue::{BlockingQueue, Queue};
use patrol_core::skip_ahead::{DefaultSkipAheadOptimizer, PatternBasedSkipAheadOptimizer, SkipAheadOptimizer};
use patrol_core::state::{ObjectState, State};
use patrol_core::state_managers::{DoorStateManager, MotionStateManager, ObjectDetectorHandle, ObjectStateManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Stands in for the real inference backend when the crate is built
/// without the `onnx` feature (spec §1 "NN inference backends are
/// out-of-scope collaborators").
struct NullModelBackend;

impl ModelBackend for NullModelBackend {
    fn infer(&self, _crop: &image::RgbImage) -> Result<Vec<DetectionBox>> {
        Ok(Vec::new())
    }
}

fn rect_of((xmin, ymin, xmax, ymax): (u32, u32, u32, u32)) -> Rect {
    Rect { xmin, ymin, xmax, ymax }
}

fn build_door_detector(config: &Config) -> Option<Box<dyn DoorStateDetector>> {
    match config.door_state_detector.as_ref()? {
        DoorStateDetectorConfig::SingleShotColor {
            contour,
            closed_rgb,
            open_rgb,
        } => Some(Box::new(SingleShotColorDetector {
            contour: rect_of(*contour),
            closed_rgb: *closed_rgb,
            open_rgb: *open_rgb,
        })),
        DoorStateDetectorConfig::FrameDiff { door, frame, threshold } => Some(Box::new(FrameDiffDetector {
            door: rect_of(*door),
            frame: rect_of(*frame),
            threshold: *threshold,
        })),
        DoorStateDetectorConfig::Adaptive {
            contour,
            threshold,
            warmup_frames,
            refresh_every,
        } => Some(Box::new(AdaptiveDoorStateDetector::new(
            rect_of(*contour),
            *threshold,
            *warmup_frames,
            *refresh_every,
        ))),
    }
}

#[cfg(feature = "file_mode")]
fn build_frame_producer(config: &Config) -> Result<Box<dyn RawFrameProducer>> {
    let path = config
        .video_file_path
        .as_ref()
        .context("input_mode is VIDEO_FILE but video_file_path is unset")?;
    Ok(Box::new(patrol_core::backends::mp4::Mp4FrameProducer::open(path)?))
}

#[cfg(not(feature = "file_mode"))]
fn build_frame_producer(_config: &Config) -> Result<Box<dyn RawFrameProducer>> {
    anyhow::bail!("file mode disabled; rebuild with --features file_mode")
}

fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&PathBuf::from(&config_path)).with_context(|| format!("loading {config_path}"))?;

    if config.input_mode != InputMode::VideoFile {
        warn!("only VIDEO_FILE input_mode is wired in this CLI; NETWORK_STREAM/CAMERA are out-of-scope collaborators");
    }

    let producer = build_frame_producer(&config)?;
    let mode = if config.video_in_sync {
        SourceMode::InSync
    } else {
        SourceMode::FreeRun
    };
    let frame_source = Arc::new(FrameSource::start(mode, 8, config.motion.frame_rate, producer));

    let pattern_detector = Arc::new(PatternDetector::new(
        config.pattern_detection.pattern_steps.clone(),
        config.pattern_detection.state_history_length,
        config.pattern_detection.state_history_length_partial,
    ));

    let broker_queue: Arc<dyn Queue<Notification>> = Arc::new(BlockingQueue::new(64));
    let notifier_queue: Arc<dyn Queue<Notification>> = Arc::new(BlockingQueue::new(config.notifier.notifier_queue_size));

    let door_manager = Arc::new(DoorStateManager::new(pattern_detector.clone(), broker_queue.clone()));
    let motion_manager = Arc::new(MotionStateManager::new(pattern_detector.clone(), broker_queue.clone()));

    let od_handle = Arc::new(ObjectDetectorHandle::default());
    let object_state_manager = Arc::new(ObjectStateManager::new(pattern_detector.clone(), od_handle.clone()));

    if config.pattern_detection.enabled {
        pattern_detector.register_state_manager(object_state_manager.clone());
    }

    let od_queue: Arc<dyn Queue<ObjectTask>> = Arc::new(BlockingQueue::new(config.object.od_task_q_size));

    let skip_ahead: Arc<dyn SkipAheadOptimizer> = if config.pattern_detection.enabled {
        Arc::new(PatternBasedSkipAheadOptimizer::new(
            pattern_detector.clone(),
            State::Object(ObjectState::ObjectDetected),
        ))
    } else {
        Arc::new(DefaultSkipAheadOptimizer)
    };

    let model: Arc<dyn ModelBackend> = build_model_backend(&config)?;
    let filters = DetectionFilters {
        score_threshold: config.object.accuracy_threshold,
        allowed_labels: if config.object.detection_labels.iter().any(|l| l == "*") {
            None
        } else {
            Some(config.object.detection_labels.clone())
        },
        min_width: config.object.box_threshold_w,
        min_height: config.object.box_threshold_h,
        positive_masks: config.object.detection_masks.iter().copied().map(rect_of).collect(),
        negative_masks: config.object.detection_nmasks.iter().copied().map(rect_of).collect(),
    };
    let buffer = DetectionBuffer::new(config.object.detection_buffer_duration_ms, config.object.detection_buffer_threshold);
    let mut worker = ObjectDetectorWorker::new(
        od_queue.clone(),
        model,
        filters,
        skip_ahead,
        od_handle,
        broker_queue.clone(),
        buffer,
        ObjectDetectorWorkerConfig {
            fps: config.object.od_frame_rate,
            output_dir: config.object.output_detection_path.clone(),
            write_jpeg: config.object.od_frame_write,
            write_xml: config.object.od_annotation_write,
        },
    );
    std::thread::spawn(move || worker.run());

    let door_detector = build_door_detector(&config);
    let orchestrator_config = OrchestratorConfig {
        md_fps: config.motion.frame_rate,
        motion: motion_config_of(&config),
        pattern_interval: Duration::from_secs_f64(config.pattern_detection.interval),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        frame_source,
        od_queue,
        broker_queue.clone(),
        notifier_queue.clone(),
        8,
        pattern_detector,
        door_manager,
        motion_manager,
        door_detector,
        orchestrator_config,
    ));

    let broker = Broker::new(broker_queue.clone(), notifier_queue.clone(), object_state_manager, config.pattern_detection.enabled);
    let notifier = Notifier::new(notifier_queue, Arc::new(LoggingSink), config.notifier.notifier_rate_limits.clone());

    info!("starting pipeline");
    orchestrator.start(broker, notifier);

    orchestrator.wait_until_source_exhausted();
    orchestrator.stop();
    info!("pipeline stopped");
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_model_backend(config: &Config) -> Result<Arc<dyn ModelBackend>> {
    let backend = patrol_core::backends::onnx::OnnxModelBackend::load(
        &config.object.model_path,
        &config.object.labelmap_path,
        config.object.accuracy_threshold,
    )?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "onnx"))]
fn build_model_backend(_config: &Config) -> Result<Arc<dyn ModelBackend>> {
    warn!("built without the onnx feature; object detection will report no detections");
    Ok(Arc::new(NullModelBackend))
}

fn motion_config_of(config: &Config) -> patrol_core::detectors::motion::MotionConfig {
    patrol_core::detectors::motion::MotionConfig {
        min_contour_area: config.motion.min_cont_area,
        threshold: config.motion.tval,
        bg_accum_weight: config.motion.bg_accum_weight,
        warmup_frame_count: config.motion.warmup_frame_count,
        box_threshold_x: config.motion.box_threshold_x,
        box_threshold_y: config.motion.box_threshold_y,
        positive_mask: config.motion.mask.map(rect_of),
        negative_mask: config.motion.nmask.map(rect_of),
    }
}

