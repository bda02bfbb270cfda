//! SPDX-License-Identifier: GPL-3.0-or-later

//! Motion detector (spec §4.3, C3). Pixel-level background subtraction
//! and contour extraction are out-of-scope collaborators seen as a
//! black-box "frame classifier"; what this module owns is the running
//! background-model state machine and the mask/threshold contract the
//! rest of the pipeline depends on.

use crate::detectors::door::Rect;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect as DrawRect;

/// Per-invocation configuration, read fresh each call (spec §4.3
/// "Reconfiguration").
#[derive(Debug, Clone)]
pub struct MotionConfig {
    pub min_contour_area: u32,
    pub threshold: u8,
    pub bg_accum_weight: f32,
    pub warmup_frame_count: u32,
    pub box_threshold_x: u32,
    pub box_threshold_y: u32,
    pub positive_mask: Option<Rect>,
    pub negative_mask: Option<Rect>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_contour_area: 500,
            threshold: 25,
            bg_accum_weight: 0.05,
            warmup_frame_count: 10,
            box_threshold_x: 20,
            box_threshold_y: 20,
            positive_mask: None,
            negative_mask: None,
        }
    }
}

/// Result of one motion-detection invocation (spec §4.3 "Outputs": the
/// triple `(annotated_frame, crop_rect | ∅, motion_outside | ∅)`).
#[derive(Debug, Clone)]
pub struct MotionResult {
    pub annotated: RgbImage,
    pub crop: Option<Rect>,
    pub motion_outside: Option<bool>,
}

fn draw_motion_box(frame: &image::RgbImage, rect: &Rect) -> RgbImage {
    let mut annotated = frame.clone();
    draw_hollow_rect_mut(
        &mut annotated,
        DrawRect::at(rect.xmin as i32, rect.ymin as i32).of_size(rect.width().max(1), rect.height().max(1)),
        Rgb([0, 255, 0]),
    );
    annotated
}

fn contains(outer: &Rect, inner: &Rect) -> bool {
    inner.xmin >= outer.xmin && inner.ymin >= outer.ymin && inner.xmax <= outer.xmax && inner.ymax <= outer.ymax
}

fn intersects(a: &Rect, b: &Rect) -> bool {
    a.xmin < b.xmax && b.xmin < a.xmax && a.ymin < b.ymax && b.ymin < a.ymax
}

/// Stateful across frames (the background model); called from a single
/// thread (spec §4.3).
pub struct MotionDetector {
    background: Option<GrayImage>,
    frames_seen: u32,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self {
            background: None,
            frames_seen: 0,
        }
    }

    /// Clears the background model, forcing a fresh warm-up (spec §4.3
    /// "a reset flag clears the background model").
    pub fn reset(&mut self) {
        self.background = None;
        self.frames_seen = 0;
    }

    pub fn process(&mut self, frame: &image::RgbImage, config: &MotionConfig) -> MotionResult {
        let gray = image::imageops::grayscale(frame);
        let blurred = gaussian_blur_f32(&gray, 1.0);

        self.frames_seen += 1;

        let background = match &mut self.background {
            None => {
                self.background = Some(blurred);
                return MotionResult {
                    annotated: frame.clone(),
                    crop: None,
                    motion_outside: None,
                };
            }
            Some(bg) => bg,
        };

        if self.frames_seen <= config.warmup_frame_count {
            accumulate(background, &blurred, config.bg_accum_weight);
            return MotionResult {
                annotated: frame.clone(),
                crop: None,
                motion_outside: None,
            };
        }

        let diff = absdiff(background, &blurred);
        accumulate(background, &blurred, config.bg_accum_weight);

        let thresholded = threshold(&diff, config.threshold);
        let contours = find_contours::<i32>(&thresholded);

        let mut union: Option<Rect> = None;
        for c in &contours {
            if c.border_type != BorderType::Outer {
                continue;
            }
            let (min, max) = bounding_box(&c.points);
            let area = ((max.0 - min.0) as u32).saturating_mul((max.1 - min.1) as u32);
            if area < config.min_contour_area {
                continue;
            }
            let rect = Rect {
                xmin: min.0 as u32,
                ymin: min.1 as u32,
                xmax: max.0 as u32,
                ymax: max.1 as u32,
            };
            union = Some(match union {
                None => rect,
                Some(u) => Rect {
                    xmin: u.xmin.min(rect.xmin),
                    ymin: u.ymin.min(rect.ymin),
                    xmax: u.xmax.max(rect.xmax),
                    ymax: u.ymax.max(rect.ymax),
                },
            });
        }

        let Some(mut rect) = union else {
            return MotionResult {
                annotated: frame.clone(),
                crop: None,
                motion_outside: None,
            };
        };

        let mut motion_outside = None;
        if let Some(pmask) = &config.positive_mask {
            if !intersects(pmask, &rect) {
                return MotionResult {
                    annotated: frame.clone(),
                    crop: None,
                    motion_outside: None,
                };
            }
            rect = Rect {
                xmin: rect.xmin.max(pmask.xmin),
                ymin: rect.ymin.max(pmask.ymin),
                xmax: rect.xmax.min(pmask.xmax),
                ymax: rect.ymax.min(pmask.ymax),
            };
            motion_outside = Some(!contains(pmask, &rect));
        }

        if rect.width() < config.box_threshold_x || rect.height() < config.box_threshold_y {
            return MotionResult {
                annotated: frame.clone(),
                crop: None,
                motion_outside: None,
            };
        }

        if let Some(nmask) = &config.negative_mask {
            if contains(nmask, &rect) {
                return MotionResult {
                    annotated: frame.clone(),
                    crop: None,
                    motion_outside: None,
                };
            }
        }

        MotionResult {
            annotated: draw_motion_box(frame, &rect),
            crop: Some(rect),
            motion_outside,
        }
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate(background: &mut GrayImage, frame: &GrayImage, weight: f32) {
    for (bg_px, fr_px) in background.pixels_mut().zip(frame.pixels()) {
        let bg = bg_px.0[0] as f32;
        let fr = fr_px.0[0] as f32;
        bg_px.0[0] = ((1.0 - weight) * bg + weight * fr).round().clamp(0.0, 255.0) as u8;
    }
}

fn absdiff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(a.width(), a.height());
    for ((o, ap), bp) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        o.0[0] = (ap.0[0] as i16 - bp.0[0] as i16).unsigned_abs() as u8;
    }
    out
}

fn threshold(img: &GrayImage, t: u8) -> GrayImage {
    let mut out = GrayImage::new(img.width(), img.height());
    for (o, p) in out.pixels_mut().zip(img.pixels()) {
        *o = if p.0[0] >= t { Luma([255]) } else { Luma([0]) };
    }
    out
}

fn bounding_box(points: &[imageproc::point::Point<i32>]) -> ((i32, i32), (i32, i32)) {
    let mut min = (i32::MAX, i32::MAX);
    let mut max = (i32::MIN, i32::MIN);
    for p in points {
        min.0 = min.0.min(p.x);
        min.1 = min.1.min(p.y);
        max.0 = max.0.max(p.x);
        max.1 = max.1.max(p.y);
    }
    (min, max)
}
