//! SPDX-License-Identifier: GPL-3.0-or-later

//! `VIDEO_FILE` input mode (spec §6 `input_mode`): decodes an mp4 file
//! with `video-rs`, the same crate and call shape the teacher's CLI uses
//! for its file-mode path.

use crate::frame::Frame;
use crate::frame_source::RawFrameProducer;
use image::RgbImage;
use log::warn;
use ndarray::Axis;
use std::path::Path;

pub struct Mp4FrameProducer {
    decoder: video_rs::Decoder,
}

impl Mp4FrameProducer {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        video_rs::init()?;
        let decoder = video_rs::Decoder::new(path)?;
        Ok(Self { decoder })
    }
}

impl RawFrameProducer for Mp4FrameProducer {
    fn next_frame(&mut self) -> Option<Frame> {
        let (time, frame) = match self.decoder.decode_iter().next()? {
            Ok(pair) => pair,
            Err(e) => {
                warn!("mp4 decode failed: {e}");
                return None;
            }
        };

        let (height, width, _channels) = frame.dim();
        let mut rgb = RgbImage::new(width as u32, height as u32);
        for (y, row) in frame.axis_iter(Axis(0)).enumerate() {
            for (x, pixel) in row.axis_iter(Axis(0)).enumerate() {
                rgb.put_pixel(x as u32, y as u32, image::Rgb([pixel[0], pixel[1], pixel[2]]));
            }
        }

        Some(Frame::new(rgb, time.as_secs() as f64))
    }
}
