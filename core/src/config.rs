//! SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration (spec §6 "External interfaces"). A single flat record,
//! grouped into nested sections for readability, loaded from TOML with
//! `#[serde(default)]` on every optional field so a partial config file
//! is always valid.

use crate::notifier::NotificationKind;
use crate::state::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// Motion detector options (spec §6 `md_*`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionDetectorConfig {
    pub min_cont_area: u32,
    pub tval: u8,
    pub bg_accum_weight: f32,
    pub warmup_frame_count: u32,
    pub enable_erode: bool,
    pub enable_dilate: bool,
    pub erode_iterations: u32,
    pub dilate_iterations: u32,
    pub frame_rate: f64,
    pub box_threshold_x: u32,
    pub box_threshold_y: u32,
    pub mask: Option<(u32, u32, u32, u32)>,
    pub nmask: Option<(u32, u32, u32, u32)>,
    pub update_bg_model: bool,
    pub reset_bg_model: bool,
    pub blur_output_frame: bool,
    pub show_all_contours: bool,
}

impl Default for MotionDetectorConfig {
    fn default() -> Self {
        Self {
            min_cont_area: 500,
            tval: 25,
            bg_accum_weight: 0.05,
            warmup_frame_count: 10,
            enable_erode: false,
            enable_dilate: false,
            erode_iterations: 1,
            dilate_iterations: 1,
            frame_rate: 5.0,
            box_threshold_x: 20,
            box_threshold_y: 20,
            mask: None,
            nmask: None,
            update_bg_model: true,
            reset_bg_model: false,
            blur_output_frame: false,
            show_all_contours: false,
        }
    }
}

/// Object detector options (spec §6 `tf_*`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObjectDetectorConfig {
    pub model_path: PathBuf,
    pub labelmap_path: PathBuf,
    pub accuracy_threshold: f32,
    pub detection_labels: Vec<String>,
    pub detection_masks: Vec<(u32, u32, u32, u32)>,
    pub detection_nmasks: Vec<(u32, u32, u32, u32)>,
    pub box_threshold_w: i32,
    pub box_threshold_h: i32,
    pub detection_buffer_enabled: bool,
    pub detection_buffer_duration_ms: i64,
    pub detection_buffer_threshold: usize,
    pub detector_type: DetectorType,
    pub apply_md: bool,
    pub od_frame_write: bool,
    pub od_annotation_write: bool,
    pub output_detection_path: PathBuf,
    pub od_frame_rate: f64,
    pub od_task_q_size: usize,
    pub od_blur_output_frame: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DetectorType {
    #[default]
    Tf2,
    Tflite,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            labelmap_path: PathBuf::new(),
            accuracy_threshold: 0.5,
            detection_labels: vec!["*".into()],
            detection_masks: Vec::new(),
            detection_nmasks: Vec::new(),
            box_threshold_w: 0,
            box_threshold_h: 0,
            detection_buffer_enabled: false,
            detection_buffer_duration_ms: 5000,
            detection_buffer_threshold: 1,
            detector_type: DetectorType::Tf2,
            apply_md: true,
            od_frame_write: true,
            od_annotation_write: false,
            output_detection_path: PathBuf::from("."),
            od_frame_rate: 5.0,
            od_task_q_size: 4,
            od_blur_output_frame: false,
        }
    }
}

/// Pattern detection options (spec §6 `pattern_detection_*`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternDetectionConfig {
    pub enabled: bool,
    pub pattern_steps: Vec<Pattern>,
    pub state_history_length: f64,
    pub state_history_length_partial: f64,
    pub interval: f64,
}

impl Default for PatternDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pattern_steps: Vec::new(),
            state_history_length: 20.0,
            state_history_length_partial: 300.0,
            interval: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    NetworkStream,
    Camera,
    VideoFile,
}

/// Notifier options (spec §6 "Notifier").
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub send_mqtt: bool,
    pub send_webhook: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub notifier_queue_size: usize,
    #[serde(with = "rate_limit_map")]
    pub notifier_rate_limits: HashMap<NotificationKind, f64>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            send_mqtt: false,
            send_webhook: false,
            mqtt_host: String::new(),
            mqtt_port: 1883,
            mqtt_username: String::new(),
            mqtt_password: String::new(),
            notifier_queue_size: 64,
            notifier_rate_limits: HashMap::new(),
        }
    }
}

/// TOML has no native map-with-enum-key support, so rate limits are
/// (de)serialized via their string names.
mod rate_limit_map {
    use super::NotificationKind;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    fn kind_name(k: &NotificationKind) -> &'static str {
        match k {
            NotificationKind::ObjectDetected => "object_detected",
            NotificationKind::PatternDetected => "pattern_detected",
            NotificationKind::DoorStateChanged => "door_state_changed",
            NotificationKind::MotionStateChanged => "motion_state_changed",
        }
    }

    fn kind_from_name(name: &str) -> Option<NotificationKind> {
        match name {
            "object_detected" => Some(NotificationKind::ObjectDetected),
            "pattern_detected" => Some(NotificationKind::PatternDetected),
            "door_state_changed" => Some(NotificationKind::DoorStateChanged),
            "motion_state_changed" => Some(NotificationKind::MotionStateChanged),
            _ => None,
        }
    }

    pub fn serialize<S: Serializer>(map: &HashMap<NotificationKind, f64>, s: S) -> Result<S::Ok, S::Error> {
        let named: HashMap<&str, f64> = map.iter().map(|(k, v)| (kind_name(k), *v)).collect();
        named.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<NotificationKind, f64>, D::Error> {
        let named: HashMap<String, f64> = HashMap::deserialize(d)?;
        Ok(named
            .into_iter()
            .filter_map(|(name, rate)| kind_from_name(&name).map(|k| (k, rate)))
            .collect())
    }
}

/// Door detector variant + parameters (spec §6 `door_state_detector`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum DoorStateDetectorConfig {
    SingleShotColor {
        contour: (u32, u32, u32, u32),
        closed_rgb: (f64, f64, f64),
        open_rgb: (f64, f64, f64),
    },
    FrameDiff {
        door: (u32, u32, u32, u32),
        frame: (u32, u32, u32, u32),
        threshold: f64,
    },
    Adaptive {
        contour: (u32, u32, u32, u32),
        threshold: f64,
        warmup_frames: u32,
        refresh_every: u32,
    },
}

/// The top-level config (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub motion: MotionDetectorConfig,
    pub object: ObjectDetectorConfig,
    pub pattern_detection: PatternDetectionConfig,
    pub door_state_detector: Option<DoorStateDetectorConfig>,
    #[serde(default = "default_true")]
    pub door_state_detector_show_detection: bool,
    pub input_mode: InputMode,
    pub rtmp_stream_url: Option<String>,
    pub video_file_path: Option<PathBuf>,
    pub video_in_sync: bool,
    pub notifier: NotifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            motion: MotionDetectorConfig::default(),
            object: ObjectDetectorConfig::default(),
            pattern_detection: PatternDetectionConfig::default(),
            door_state_detector: None,
            door_state_detector_show_detection: true,
            input_mode: InputMode::default(),
            rtmp_stream_url: None,
            video_file_path: None,
            video_in_sync: true,
            notifier: NotifierConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, crate::error::PipelineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::PipelineError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| crate::error::PipelineError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_pattern_detection_disabled() {
        let config = Config::default();
        assert!(!config.pattern_detection.enabled);
        assert_eq!(config.pattern_detection.state_history_length, 20.0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let toml_src = r#"
            [motion]
            tval = 40

            [pattern_detection]
            enabled = true
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.motion.tval, 40);
        assert_eq!(config.motion.min_cont_area, 500);
        assert!(config.pattern_detection.enabled);
    }

    #[test]
    fn notifier_rate_limits_roundtrip_through_toml() {
        let mut limits = HashMap::new();
        limits.insert(NotificationKind::DoorStateChanged, 0.5);
        let config = Config {
            notifier: NotifierConfig {
                notifier_rate_limits: limits,
                ..NotifierConfig::default()
            },
            ..Config::default()
        };
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(
            parsed.notifier.notifier_rate_limits.get(&NotificationKind::DoorStateChanged),
            Some(&0.5)
        );
    }
}
