//! A deterministic software camera.
//!
//! Useful in tests and as the default device when no hardware backend is
//! compiled in: it plays a fixed sequence of frames on a loop at a bounded
//! rate and accepts every property set.

use std::collections::BTreeMap;

use machine_vision_formats::ImageData;

use crate::{ArenaCamera, CamProp, RgbFrame, Result};

/// Default simulated frame interval.
const FRAME_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

pub struct SimCamera {
    frames: Vec<RgbFrame>,
    next: usize,
    props: BTreeMap<CamProp, f64>,
    interval: std::time::Duration,
}

impl SimCamera {
    /// A camera playing the given frames on a loop.
    ///
    /// Panics: panics when `frames` is empty.
    pub fn from_frames(frames: Vec<RgbFrame>) -> Self {
        assert!(!frames.is_empty(), "SimCamera needs at least one frame");
        let mut props = BTreeMap::new();
        props.insert(CamProp::FrameWidth, frames[0].width() as f64);
        props.insert(CamProp::FrameHeight, frames[0].height() as f64);
        for prop in [
            CamProp::Brightness,
            CamProp::Contrast,
            CamProp::Saturation,
            CamProp::Exposure,
            CamProp::AutoExposure,
            CamProp::IsoSpeed,
        ] {
            props.insert(prop, 0.0);
        }
        SimCamera {
            frames,
            next: 0,
            props,
            interval: FRAME_INTERVAL,
        }
    }

    /// A camera producing a single flat-colored frame forever.
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let stride = width as usize * 3;
        let mut data = Vec::with_capacity(stride * height as usize);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgb);
        }
        let frame = RgbFrame::new(width, height, stride, data).unwrap();
        Self::from_frames(vec![frame])
    }
}

impl ArenaCamera for SimCamera {
    fn width(&self) -> u32 {
        self.frames[0].width()
    }

    fn height(&self) -> u32 {
        self.frames[0].height()
    }

    fn next_frame(&mut self) -> Result<RgbFrame> {
        std::thread::sleep(self.interval);
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }

    fn feature_float(&self, prop: CamProp) -> f64 {
        *self.props.get(&prop).unwrap()
    }

    fn set_feature_float(&mut self, prop: CamProp, value: f64) -> Result<()> {
        self.props.insert(prop, value);
        Ok(())
    }
}
