//! Webcam backend over the `nokhwa` capture crate.

use nokhwa::{
    pixel_format::RgbFormat,
    utils::{
        CameraIndex, ControlValueDescription, ControlValueSetter, KnownCameraControl,
        RequestedFormat, RequestedFormatType,
    },
    Camera,
};

use crate::{ArenaCamera, CamProp, Error, Result, RgbFrame, FEATURE_UNSUPPORTED};

pub struct NokhwaCamera {
    camera: Camera,
    width: u32,
    height: u32,
}

fn known_control(prop: CamProp) -> Option<KnownCameraControl> {
    match prop {
        CamProp::Brightness => Some(KnownCameraControl::Brightness),
        CamProp::Contrast => Some(KnownCameraControl::Contrast),
        CamProp::Saturation => Some(KnownCameraControl::Saturation),
        CamProp::Exposure => Some(KnownCameraControl::Exposure),
        CamProp::AutoExposure => None,
        CamProp::IsoSpeed => None,
        CamProp::FrameWidth => None,
        CamProp::FrameHeight => None,
    }
}

impl NokhwaCamera {
    /// Open the camera at the given device index and start streaming.
    pub fn new(index: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera =
            Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
                Error::CameraUnavailable {
                    msg: format!("opening camera {index}: {e}"),
                }
            })?;
        camera
            .open_stream()
            .map_err(|e| Error::CameraUnavailable {
                msg: format!("starting stream on camera {index}: {e}"),
            })?;
        let resolution = camera.resolution();
        Ok(NokhwaCamera {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }
}

impl ArenaCamera for NokhwaCamera {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn next_frame(&mut self) -> Result<RgbFrame> {
        let buffer = self.camera.frame().map_err(|e| Error::CaptureFailed {
            msg: e.to_string(),
        })?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CaptureFailed {
                msg: e.to_string(),
            })?;
        let (w, h) = (decoded.width(), decoded.height());
        let data = decoded.into_raw();
        RgbFrame::new(w, h, w as usize * 3, data).ok_or(Error::CaptureFailed {
            msg: "frame buffer too small".into(),
        })
    }

    fn feature_float(&self, prop: CamProp) -> f64 {
        match prop {
            CamProp::FrameWidth => return self.width as f64,
            CamProp::FrameHeight => return self.height as f64,
            _ => {}
        }
        let Some(control) = known_control(prop) else {
            return FEATURE_UNSUPPORTED;
        };
        match self.camera.camera_control(control) {
            Ok(ctrl) => match ctrl.description() {
                ControlValueDescription::Integer { value, .. } => *value as f64,
                ControlValueDescription::IntegerRange { value, .. } => *value as f64,
                ControlValueDescription::Float { value, .. } => *value,
                ControlValueDescription::FloatRange { value, .. } => *value,
                _ => FEATURE_UNSUPPORTED,
            },
            Err(_) => FEATURE_UNSUPPORTED,
        }
    }

    fn set_feature_float(&mut self, prop: CamProp, value: f64) -> Result<()> {
        let control = known_control(prop).ok_or(Error::FeatureNotSupported(prop))?;
        self.camera
            .set_camera_control(control, ControlValueSetter::Integer(value as i64))
            .map_err(|e| Error::CaptureFailed {
                msg: format!("setting {prop:?}: {e}"),
            })
    }
}
