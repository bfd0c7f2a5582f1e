//! Robot detection pipeline for the arena locator.
//!
//! [`ArenaLocator`] is the synchronous core the adapters drive: one
//! [`update`](ArenaLocator::update) call pulls a preprocessed snapshot from
//! the frame source, finds robot rectangles in the edge map, classifies the
//! smaller contours as id dots or direction markers, annotates the scene,
//! and leaves the per-robot results available from
//! [`get_robots`](ArenaLocator::get_robots).

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use arena_camera::{ArenaCamera, CamProp, FrameSource, ProcessingConfig};
use arena_contour::{find_contours, RetrievalMode};
use arena_params::{names, ParamStore};
use arena_types::{Rgb, RobotId, RobotMap, RobotPose};
use machine_vision_formats::ImageData;

pub mod detect;
pub mod draw;
pub mod recorder;
pub mod robot;

pub use arena_camera::RgbFrame;
pub use detect::{BotGates, FeatureGates};
pub use robot::{team_color, ContourBound, Robot, JITTER};

use recorder::MovieRecorder;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The frame source has not published a snapshot yet; retry next tick.
    #[error("no snapshot available yet")]
    NotReady,
    /// A once-only robot field was set twice.
    #[error("field already set")]
    AlreadySet,
    #[error(transparent)]
    Camera(arena_camera::Error),
    #[error(transparent)]
    Params(#[from] arena_params::Error),
    #[error(transparent)]
    Recording(#[from] recorder::Error),
}

impl From<arena_camera::Error> for Error {
    fn from(orig: arena_camera::Error) -> Self {
        match orig {
            arena_camera::Error::NotReady => Error::NotReady,
            other => Error::Camera(other),
        }
    }
}

/// Construction options for [`ArenaLocator`].
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Run contour finding on the mask-sized edge map and re-offset results
    /// (faster), instead of the full-frame embedding.
    pub use_small_edges: bool,
    /// Record annotated scenes when positive.
    pub recording_fps: f64,
    pub recording_path: PathBuf,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            use_small_edges: true,
            recording_fps: 0.0,
            recording_path: PathBuf::from("output.fmf"),
        }
    }
}

/// Camera properties pushed to the device on every update, with the
/// parameter that holds each one.
const CAMERA_PROPS: [(CamProp, &str); 5] = [
    (CamProp::Brightness, names::CAMERA_BRIGHTNESS),
    (CamProp::Contrast, names::CAMERA_CONTRAST),
    (CamProp::Saturation, names::CAMERA_SATURATION),
    (CamProp::Exposure, names::CAMERA_EXPOSURE),
    (CamProp::IsoSpeed, names::CAMERA_ISO_SPEED),
];

pub struct ArenaLocator {
    params: ParamStore,
    frames: FrameSource,
    bots_found: Vec<Robot>,
    bot_colors: BTreeMap<RobotId, Rgb>,
    show_crosshairs: bool,
    show_mask_rect: bool,
    show_scale_rect: bool,
    use_small_edges: bool,
    recorder: Option<MovieRecorder<std::fs::File>>,
}

impl ArenaLocator {
    /// Build the locator around an opened camera.
    ///
    /// Spawns the frame-source workers and, when `recording_fps` is
    /// positive, opens the movie file.
    pub fn new(
        camera: Box<dyn ArenaCamera>,
        params: ParamStore,
        cfg: LocatorConfig,
    ) -> Result<ArenaLocator> {
        let processing = ProcessingConfig {
            threshold: params.get_f64(names::THRESH_MIN)?.clamp(0.0, 255.0) as u8,
            after_canny_threshold: params
                .get_f64(names::AFTER_CANNY_THRESH_MIN)?
                .clamp(0.0, 255.0) as u8,
            canny_min: params.get_f64(names::CANNY_MIN)? as f32,
            canny_max: params.get_f64(names::CANNY_MAX)? as f32,
        };
        let (mask_w, mask_h) = params.get_pair(names::ARENA_MASK_SIZE)?;
        let frames = FrameSource::new(camera, processing, (mask_w as u32, mask_h as u32));

        let bot_colors = (1..=8).map(|id| (id, team_color(id))).collect();

        let recorder = if cfg.recording_fps > 0.0 {
            Some(MovieRecorder::create(&cfg.recording_path)?)
        } else {
            None
        };

        Ok(ArenaLocator {
            params,
            frames,
            bots_found: Vec::new(),
            bot_colors,
            show_crosshairs: false,
            show_mask_rect: false,
            show_scale_rect: false,
            use_small_edges: cfg.use_small_edges,
            recorder,
        })
    }

    /// Process one frame and return the annotated scene.
    ///
    /// Fails with [`Error::NotReady`] until the frame source has published
    /// its first snapshot; the caller simply retries on the next tick.
    pub fn update(&mut self) -> Result<RgbFrame> {
        self.bots_found.clear();

        // push possibly-changed tunables down to the device and mask
        for (prop, name) in CAMERA_PROPS {
            if let Ok(value) = self.params.get_f64(name) {
                self.frames.set_cap(prop, value);
            }
        }
        if let Ok((mask_w, mask_h)) = self.params.get_pair(names::ARENA_MASK_SIZE) {
            self.frames.make_mask(mask_w as u32, mask_h as u32);
        }

        let mut scene = self.frames.read_bgr()?;
        let (edges, mask_offset) = if self.use_small_edges {
            (self.frames.read_small_edges()?, self.frames.mask_offset())
        } else {
            (self.frames.read_edges()?, (0, 0))
        };
        let offset = (mask_offset.0 as f64, mask_offset.1 as f64);

        let bot_gates = BotGates {
            min_area: self.params.get_f64(names::MIN_BOT_AREA)?,
            max_area: self.params.get_f64(names::MAX_BOT_AREA)?,
            min_aspect: self.params.get_f64(names::MIN_BOT_ASPECT_RATIO)?,
            max_aspect: self.params.get_f64(names::MAX_BOT_ASPECT_RATIO)?,
        };
        let external = find_contours(&edges, RetrievalMode::External);
        self.bots_found = detect::find_robots(&external, &bot_gates, offset);
        debug!(
            "{} external contours, {} robots",
            external.len(),
            self.bots_found.len()
        );

        let feature_gates = FeatureGates {
            min_dot_r: self.params.get_f64(names::MIN_DOT_R)?,
            max_dot_r: self.params.get_f64(names::MAX_DOT_R)?,
            min_director_r: self.params.get_f64(names::MIN_DIRECTOR_R)?,
            max_director_r: self.params.get_f64(names::MAX_DIRECTOR_R)?,
        };
        let tree = find_contours(&edges, RetrievalMode::Tree);
        detect::bind_features(&tree, &mut self.bots_found, &feature_gates, offset);

        for bot in &mut self.bots_found {
            if let Some(color) = bot.id().and_then(|id| self.bot_colors.get(&id)) {
                bot.color = *color;
            }
        }
        self.annotate(&mut scene);

        if let Some(recorder) = &mut self.recorder {
            let now = chrono::Utc::now();
            let timestamp = now.timestamp() as f64 + now.timestamp_subsec_nanos() as f64 * 1e-9;
            recorder.write_frame(&scene, timestamp)?;
        }

        Ok(scene)
    }

    fn annotate(&self, scene: &mut RgbFrame) {
        for bot in &self.bots_found {
            if let Some(contour) = bot.contour() {
                draw::draw_polyline(scene, contour, true, bot.color);
            }
            if let Some(loc) = bot.location() {
                let label = match bot.id() {
                    Some(id) => id.to_string(),
                    None => "?".to_string(),
                };
                draw::draw_text(
                    scene,
                    &label,
                    (loc.x - 20.0, loc.y - 24.0),
                    48.0,
                    bot.text_color,
                );
            }
        }

        if self.show_crosshairs {
            draw::draw_crosshairs(scene, Rgb(255, 255, 255));
        }
        if self.show_mask_rect {
            let (x1, y1) = self.frames.mask_offset();
            let (w, h) = self.frames.mask_size();
            draw::draw_rect(
                scene,
                (x1 as i64, y1 as i64),
                ((x1 + w) as i64, (y1 + h) as i64),
                Rgb(255, 255, 0),
            );
        }
        if self.show_scale_rect {
            self.draw_scale_rect(scene);
        }
    }

    /// Draw the calibration-target rectangle (an A4 sheet by default) so the
    /// pixel scale can be tuned against a physical sheet on the arena floor.
    fn draw_scale_rect(&self, scene: &mut RgbFrame) {
        let Ok((sx, sy)) = self.params.get_pair(names::SCALE_RECT_SIZE) else {
            return;
        };
        let scale = self.camera_scale();
        let (rw, rh) = (sx * scale, sy * scale);
        let (cx, cy) = (scene.width() as f64 / 2.0, scene.height() as f64 / 2.0);
        draw::draw_rect(
            scene,
            ((cx - rw / 2.0) as i64, (cy - rh / 2.0) as i64),
            ((cx + rw / 2.0) as i64, (cy + rh / 2.0) as i64),
            Rgb(0, 255, 0),
        );
    }

    fn camera_scale(&self) -> f64 {
        self.params
            .get_f64(names::CAMERA_SCALE)
            .expect("CAMERA_SCALE is in the default table")
    }

    /// Millimetre positions and headings of the robots found by the last
    /// [`update`](ArenaLocator::update), keyed by id. Robots without id dots
    /// are omitted.
    pub fn get_robots(&self) -> RobotMap {
        let scale = self.camera_scale();
        let mut map = RobotMap::new();
        for bot in &self.bots_found {
            let (Some(id), Some(loc)) = (bot.id(), bot.location()) else {
                continue;
            };
            map.insert(
                id,
                RobotPose {
                    x_mm: (loc.x * scale).round() as i32,
                    y_mm: (loc.y * scale).round() as i32,
                    heading: bot.heading(),
                },
            );
        }
        map
    }

    /// The raw per-robot records from the last update.
    pub fn bots_found(&self) -> &[Robot] {
        &self.bots_found
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    // ---- tuning setters, forwarded to the parameter store (and to the
    // frame source where the value is consumed there) ----

    pub fn set_dot_size(&self, min: f64, max: f64) {
        self.params.set(names::MIN_DOT_R, min);
        self.params.set(names::MAX_DOT_R, max);
    }

    pub fn set_director_size(&self, min: f64, max: f64) {
        self.params.set(names::MIN_DIRECTOR_R, min);
        self.params.set(names::MAX_DIRECTOR_R, max);
    }

    pub fn set_bot_area(&self, min: f64, max: f64) {
        self.params.set(names::MIN_BOT_AREA, min);
        self.params.set(names::MAX_BOT_AREA, max);
    }

    pub fn set_bot_aspect(&self, min: f64, max: f64) {
        self.params.set(names::MIN_BOT_ASPECT_RATIO, min);
        self.params.set(names::MAX_BOT_ASPECT_RATIO, max);
    }

    pub fn set_threshold(&self, value: u8) {
        self.params.set(names::THRESH_MIN, value as f64);
        self.frames.set_threshold(value);
    }

    pub fn set_after_canny_threshold(&self, value: u8) {
        self.params.set(names::AFTER_CANNY_THRESH_MIN, value as f64);
        self.frames.set_after_canny_threshold(value);
    }

    pub fn set_canny_min(&self, value: f64) {
        self.params.set(names::CANNY_MIN, value);
        self.frames.set_canny_min(value as f32);
    }

    pub fn set_canny_max(&self, value: f64) {
        self.params.set(names::CANNY_MAX, value);
        self.frames.set_canny_max(value as f32);
    }

    /// Override the render color of one robot. Ids outside the color table
    /// are ignored.
    pub fn set_bot_color(&mut self, id: RobotId, color: Rgb) {
        if let Some(slot) = self.bot_colors.get_mut(&id) {
            *slot = color;
        }
    }

    /// Replace the whole per-robot color table.
    pub fn set_bot_colors(&mut self, colors: BTreeMap<RobotId, Rgb>) {
        self.bot_colors = colors;
    }

    pub fn bot_color(&self, id: RobotId) -> Option<Rgb> {
        self.bot_colors.get(&id).copied()
    }

    pub fn crosshair_display_enabled(&self) -> bool {
        self.show_crosshairs
    }

    pub fn enable_crosshair_display(&mut self, on: bool) {
        self.show_crosshairs = on;
    }

    pub fn enable_mask_display(&mut self, on: bool) {
        self.show_mask_rect = on;
    }

    pub fn enable_scale_display(&mut self, on: bool) {
        self.show_scale_rect = on;
    }

    /// Release the movie writer and stop the frame-source workers.
    pub fn stop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.close() {
                warn!("closing recording: {e}");
            }
        }
        self.frames.stop();
    }
}
