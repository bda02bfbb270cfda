//! SPDX-License-Identifier: GPL-3.0-or-later

//! ONNX Runtime backed object detector (spec §4.5 `ModelBackend`), one
//! concrete fulfillment of the opaque inference contract the core
//! depends on. Label names come from a plain newline-delimited labelmap
//! file (spec §6 `labelmap_path`).

use crate::detectors::object::ModelBackend;
use crate::frame::DetectionBox;
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array4, CowArray};
use ort::{inputs, GraphOptimizationLevel, Session};
use std::path::Path;

pub struct OnnxModelBackend {
    session: Session,
    labels: Vec<String>,
    score_threshold: f32,
}

impl OnnxModelBackend {
    pub fn load(model_path: &Path, labelmap_path: &Path, score_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .with_context(|| format!("loading model {}", model_path.display()))?;
        let labels = std::fs::read_to_string(labelmap_path)
            .with_context(|| format!("reading labelmap {}", labelmap_path.display()))?
            .lines()
            .map(str::to_string)
            .collect();
        Ok(Self {
            session,
            labels,
            score_threshold,
        })
    }

    fn to_tensor(crop: &RgbImage) -> Array4<f32> {
        let (w, h) = (crop.width() as usize, crop.height() as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        for (x, y, pixel) in crop.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
        tensor
    }
}

impl ModelBackend for OnnxModelBackend {
    fn infer(&self, crop: &RgbImage) -> Result<Vec<DetectionBox>> {
        let tensor = Self::to_tensor(crop);
        let input: CowArray<f32, _> = tensor.into_dyn().into();
        let outputs = self.session.run(inputs!["images" => input.view()]?)?;

        let boxes = outputs["boxes"].try_extract_tensor::<f32>()?;
        let scores = outputs["scores"].try_extract_tensor::<f32>()?;
        let class_ids = outputs["class_ids"].try_extract_tensor::<i64>()?;

        let mut detections = Vec::new();
        for ((b, &score), &class_id) in boxes
            .rows()
            .into_iter()
            .zip(scores.iter())
            .zip(class_ids.iter())
        {
            if score < self.score_threshold {
                continue;
            }
            let label = self
                .labels
                .get(class_id as usize)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            detections.push(DetectionBox {
                xmin: b[0] as i32,
                ymin: b[1] as i32,
                xmax: b[2] as i32,
                ymax: b[3] as i32,
                label,
                score,
            });
        }
        Ok(detections)
    }
}
