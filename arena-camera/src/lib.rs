//! Camera seam and lag-free frame preprocessing for the arena locator.
//!
//! [`ArenaCamera`] is the device trait: hardware backends (and the
//! deterministic [`SimCamera`] used in tests) implement it, everything else
//! consumes it. [`FrameSource`] owns a camera and runs the two background
//! workers that keep a coherent, preprocessed [`Snapshot`] available at all
//! times.

use machine_vision_formats::{
    owned::OImage,
    pixel_format::{Mono8, RGB8},
};

mod frame_source;
#[cfg(feature = "backend_nokhwa")]
mod nokhwa_backend;
mod sim;

pub use frame_source::{FrameSource, MaskRect, ProcessingConfig, Snapshot};
#[cfg(feature = "backend_nokhwa")]
pub use nokhwa_backend::NokhwaCamera;
pub use sim::SimCamera;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("camera unavailable: {msg}")]
    CameraUnavailable { msg: String },
    #[error("capture failed: {msg}")]
    CaptureFailed { msg: String },
    #[error("no snapshot available yet")]
    NotReady,
    #[error("camera feature {0:?} not supported")]
    FeatureNotSupported(CamProp),
}

/// A tunable camera device property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CamProp {
    Brightness,
    Contrast,
    Saturation,
    Exposure,
    AutoExposure,
    IsoSpeed,
    FrameWidth,
    FrameHeight,
}

/// The value a backend reports for a property it does not implement.
pub const FEATURE_UNSUPPORTED: f64 = -1.0;

/// A color camera delivering full frames on demand.
///
/// `next_frame` blocks until the device has a new frame. Implementations
/// report [`FEATURE_UNSUPPORTED`] from `feature_float` for properties they
/// cannot read, which is how callers probe support before setting.
pub trait ArenaCamera: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn next_frame(&mut self) -> Result<OImage<RGB8>>;
    fn feature_float(&self, prop: CamProp) -> f64;
    fn set_feature_float(&mut self, prop: CamProp, value: f64) -> Result<()>;
}

/// Shorthand used throughout the pipeline.
pub type RgbFrame = OImage<RGB8>;
/// Shorthand used throughout the pipeline.
pub type MonoFrame = OImage<Mono8>;
