//! SPDX-License-Identifier: GPL-3.0-or-later

//! The frame payload (spec §3 "Frame") and the fire-and-forget on-disk
//! writers for detection crops (spec §4.5 step 5, §6 "On-disk outputs").

use flume::{Receiver, Sender};
use image::RgbImage;
use log::warn;
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::Arc;

/// Opaque image payload plus a monotone timestamp. Created by the frame
/// source, moved into the orchestrator; cheap to clone where an output
/// encoder needs its own handle on the same pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rgb: Arc<RgbImage>,
    pub ts: f64,
}

impl Frame {
    pub fn new(rgb: RgbImage, ts: f64) -> Self {
        Self {
            rgb: Arc::new(rgb),
            ts,
        }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

/// `(xmin, ymin, xmax, ymax, label, score)` in full-frame pixel
/// coordinates (spec §3 "Detection box").
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
    pub label: String,
    pub score: f32,
}

impl DetectionBox {
    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> i32 {
        self.ymax - self.ymin
    }
}

enum SaveJob {
    Jpeg {
        img: RgbImage,
        path: PathBuf,
    },
    VocXml {
        xml: String,
        path: PathBuf,
    },
}

static SAVE_TX: Lazy<Sender<SaveJob>> = Lazy::new(|| {
    let (tx, rx) = flume::bounded::<SaveJob>(256);
    std::thread::spawn(move || save_worker(rx));
    tx
});

fn save_worker(rx: Receiver<SaveJob>) {
    while let Ok(job) = rx.recv() {
        match job {
            SaveJob::Jpeg { img, path } => {
                if let Err(e) = img.save(&path) {
                    warn!("failed to save detection image {}: {e}", path.display());
                }
            }
            SaveJob::VocXml { xml, path } => {
                if let Err(e) = std::fs::write(&path, xml) {
                    warn!("failed to save annotation {}: {e}", path.display());
                }
            }
        }
    }
}

/// Fire-and-forget: drops the job rather than blocking the caller if the
/// save queue is backed up (spec §7 "both are fire-and-forget").
pub fn save_detection_jpeg(img: RgbImage, path: PathBuf) {
    if SAVE_TX.try_send(SaveJob::Jpeg { img, path: path.clone() }).is_err() {
        warn!("save queue full, dropping detection image {}", path.display());
    }
}

/// Minted path: `output_dir/detection_<label>_<ts>.jpg` (spec §6).
pub fn detection_image_path(output_dir: &std::path::Path, label: &str, ts: f64) -> PathBuf {
    output_dir.join(format!("detection_{label}_{ts:.3}.jpg"))
}

/// Hand-written Pascal-VOC XML, alongside the jpeg (spec §6). No XML
/// crate is pulled in for this — the schema is tiny and fixed.
pub fn voc_xml(filename: &str, width: u32, height: u32, boxes: &[DetectionBox]) -> String {
    let mut objects = String::new();
    for b in boxes {
        objects.push_str(&format!(
            "  <object>\n    <name>{}</name>\n    <score>{:.4}</score>\n    <bndbox>\n      <xmin>{}</xmin>\n      <ymin>{}</ymin>\n      <xmax>{}</xmax>\n      <ymax>{}</ymax>\n    </bndbox>\n  </object>\n",
            b.label, b.score, b.xmin, b.ymin, b.xmax, b.ymax,
        ));
    }
    format!(
        "<annotation>\n  <filename>{filename}</filename>\n  <size>\n    <width>{width}</width>\n    <height>{height}</height>\n    <depth>3</depth>\n  </size>\n{objects}</annotation>\n"
    )
}

pub fn save_detection_xml(xml: String, path: PathBuf) {
    if SAVE_TX.try_send(SaveJob::VocXml { xml, path: path.clone() }).is_err() {
        warn!("save queue full, dropping annotation {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voc_xml_includes_every_box() {
        let boxes = vec![DetectionBox {
            xmin: 1,
            ymin: 2,
            xmax: 10,
            ymax: 20,
            label: "person".into(),
            score: 0.95,
        }];
        let xml = voc_xml("detection_person_1.0.jpg", 640, 480, &boxes);
        assert!(xml.contains("<name>person</name>"));
        assert!(xml.contains("<xmax>10</xmax>"));
        assert!(xml.contains("<width>640</width>"));
    }

    #[test]
    fn detection_image_path_uses_label_and_ts() {
        let path = detection_image_path(std::path::Path::new("/tmp/out"), "dog", 12.5);
        assert_eq!(path, std::path::PathBuf::from("/tmp/out/detection_dog_12.500.jpg"));
    }

    #[test]
    fn detection_box_dimensions() {
        let b = DetectionBox {
            xmin: 5,
            ymin: 5,
            xmax: 25,
            ymax: 45,
            label: "cat".into(),
            score: 0.5,
        };
        assert_eq!(b.width(), 20);
        assert_eq!(b.height(), 40);
    }
}
