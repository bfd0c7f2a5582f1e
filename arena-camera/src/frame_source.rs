//! The two-worker frame pipeline.
//!
//! A producer thread keeps the newest camera frame in a slot; a processor
//! thread turns that slot into the five-image [`Snapshot`] consumers read.
//! The producer never waits for the processor, so when processing is slow,
//! intermediate frames are dropped rather than queued. Lag matters more
//! than completeness here.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::{ArenaCamera, CamProp, Error, MonoFrame, Result, RgbFrame, FEATURE_UNSUPPORTED};

/// A coherent set of derived images, all produced from the same capture.
#[derive(Clone)]
pub struct Snapshot {
    /// Full-resolution color frame.
    pub bgr: RgbFrame,
    /// Grayscale of the mask region only.
    pub gray: MonoFrame,
    /// Binary threshold of `gray`.
    pub thresh: MonoFrame,
    /// Canny edges of `thresh`, mask-region sized.
    pub edges_small: MonoFrame,
    /// `edges_small` embedded at the mask offset in an otherwise black
    /// full-resolution image.
    pub edges_full: MonoFrame,
    /// Top-left corner of the mask region within the full frame.
    pub mask_offset: (u32, u32),
}

/// Centred region of interest, stored as `[y1..y2, x1..x2]` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl MaskRect {
    /// The centred rectangle of size `mask_w × mask_h` inside a
    /// `frame_w × frame_h` frame, clipped to the frame.
    pub fn centred(frame_w: u32, frame_h: u32, mask_w: u32, mask_h: u32) -> Self {
        let mw = mask_w.min(frame_w);
        let mh = mask_h.min(frame_h);
        let x1 = (frame_w - mw) / 2;
        let y1 = (frame_h - mh) / 2;
        MaskRect {
            x1,
            y1,
            x2: x1 + mw,
            y2: y1 + mh,
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Tunables consumed by the processor worker on each iteration.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingConfig {
    /// Gray level for the binary threshold stage.
    pub threshold: u8,
    /// When nonzero, the edge map is re-thresholded at this level.
    pub after_canny_threshold: u8,
    pub canny_min: f32,
    pub canny_max: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            threshold: 100,
            after_canny_threshold: 100,
            canny_min: 100.0,
            canny_max: 200.0,
        }
    }
}

struct Shared {
    /// `bgr_lock`: newest captured frame, producer-owned.
    bgr_cam: Mutex<Option<RgbFrame>>,
    /// `update_lock`: the published snapshot, swapped as a unit.
    published: Mutex<Option<Snapshot>>,
    cfg: Mutex<(ProcessingConfig, MaskRect)>,
    camera: Mutex<Box<dyn ArenaCamera>>,
    frame_w: u32,
    frame_h: u32,
}

struct Worker {
    control: thread_control::Control,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Worker {
    fn stop_and_join(&mut self) {
        self.control.stop();
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                warn!("frame worker panicked");
            }
        }
    }
}

/// Background acquisition plus on-demand preprocessing.
///
/// Constructing a `FrameSource` spawns the producer and processor workers;
/// [`stop`](FrameSource::stop) (or drop) shuts them down and releases the
/// camera.
pub struct FrameSource {
    shared: Arc<Shared>,
    workers: Vec<Worker>,
}

impl FrameSource {
    pub fn new(
        camera: Box<dyn ArenaCamera>,
        cfg: ProcessingConfig,
        mask_size: (u32, u32),
    ) -> FrameSource {
        let frame_w = camera.width();
        let frame_h = camera.height();
        let mask = MaskRect::centred(frame_w, frame_h, mask_size.0, mask_size.1);
        let shared = Arc::new(Shared {
            bgr_cam: Mutex::new(None),
            published: Mutex::new(None),
            cfg: Mutex::new((cfg, mask)),
            camera: Mutex::new(camera),
            frame_w,
            frame_h,
        });

        let producer = spawn_worker("frame-producer", {
            let shared = shared.clone();
            move |flag| produce_loop(&shared, flag)
        });
        let processor = spawn_worker("frame-processor", {
            let shared = shared.clone();
            move |flag| process_loop(&shared, flag)
        });

        FrameSource {
            shared,
            workers: vec![producer, processor],
        }
    }

    pub fn frame_width(&self) -> u32 {
        self.shared.frame_w
    }

    pub fn frame_height(&self) -> u32 {
        self.shared.frame_h
    }

    /// Deep copy of the whole published snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let guard = self.shared.published.lock().unwrap();
        guard.clone().ok_or(Error::NotReady)
    }

    pub fn read_bgr(&self) -> Result<RgbFrame> {
        let guard = self.shared.published.lock().unwrap();
        guard.as_ref().map(|s| s.bgr.clone()).ok_or(Error::NotReady)
    }

    pub fn read_gray(&self) -> Result<MonoFrame> {
        let guard = self.shared.published.lock().unwrap();
        guard
            .as_ref()
            .map(|s| s.gray.clone())
            .ok_or(Error::NotReady)
    }

    pub fn read_thresh(&self) -> Result<MonoFrame> {
        let guard = self.shared.published.lock().unwrap();
        guard
            .as_ref()
            .map(|s| s.thresh.clone())
            .ok_or(Error::NotReady)
    }

    pub fn read_edges(&self) -> Result<MonoFrame> {
        let guard = self.shared.published.lock().unwrap();
        guard
            .as_ref()
            .map(|s| s.edges_full.clone())
            .ok_or(Error::NotReady)
    }

    pub fn read_small_edges(&self) -> Result<MonoFrame> {
        let guard = self.shared.published.lock().unwrap();
        guard
            .as_ref()
            .map(|s| s.edges_small.clone())
            .ok_or(Error::NotReady)
    }

    /// Forward a device property to the camera.
    ///
    /// Returns false when the property is unsupported or the device refuses
    /// the value.
    pub fn set_cap(&self, prop: CamProp, value: f64) -> bool {
        let mut cam = self.shared.camera.lock().unwrap();
        if cam.feature_float(prop) == FEATURE_UNSUPPORTED {
            debug!("camera property {prop:?} is not supported");
            return false;
        }
        match cam.set_feature_float(prop, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not set camera property {prop:?}: {e}");
                false
            }
        }
    }

    /// Gray level for the binary threshold stage.
    pub fn set_threshold(&self, value: u8) {
        self.shared.cfg.lock().unwrap().0.threshold = value;
    }

    /// Edge re-threshold level; zero disables the stage.
    pub fn set_after_canny_threshold(&self, value: u8) {
        self.shared.cfg.lock().unwrap().0.after_canny_threshold = value;
    }

    pub fn set_canny_min(&self, value: f32) {
        self.shared.cfg.lock().unwrap().0.canny_min = value;
    }

    pub fn set_canny_max(&self, value: f32) {
        self.shared.cfg.lock().unwrap().0.canny_max = value;
    }

    /// Set the centred detection region. Takes effect on the next processor
    /// iteration.
    pub fn make_mask(&self, mask_w: u32, mask_h: u32) {
        let mask = MaskRect::centred(self.shared.frame_w, self.shared.frame_h, mask_w, mask_h);
        self.shared.cfg.lock().unwrap().1 = mask;
    }

    pub fn mask_offset(&self) -> (u32, u32) {
        let mask = self.shared.cfg.lock().unwrap().1;
        (mask.x1, mask.y1)
    }

    pub fn mask_size(&self) -> (u32, u32) {
        let mask = self.shared.cfg.lock().unwrap().1;
        (mask.width(), mask.height())
    }

    /// Signal both workers and wait for them to exit.
    pub fn stop(&mut self) {
        for worker in &mut self.workers {
            worker.stop_and_join();
        }
        self.workers.clear();
    }

    /// Alias of [`stop`](FrameSource::stop).
    pub fn release(&mut self) {
        self.stop();
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker<F>(name: &str, body: F) -> Worker
where
    F: FnOnce(thread_control::Flag) + Send + 'static,
{
    let (flag, control) = thread_control::make_pair();
    let join_handle = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(flag))
        .expect("spawning thread");
    Worker {
        control,
        join_handle: Some(join_handle),
    }
}

fn produce_loop(shared: &Shared, flag: thread_control::Flag) {
    while flag.is_alive() {
        let frame = {
            let mut cam = shared.camera.lock().unwrap();
            cam.next_frame()
        };
        match frame {
            Ok(frame) => {
                *shared.bgr_cam.lock().unwrap() = Some(frame);
            }
            Err(e) => {
                warn!("unable to read camera stream: {e}");
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }
    debug!("frame producer done");
}

fn process_loop(shared: &Shared, flag: thread_control::Flag) {
    while flag.is_alive() {
        // clone the producer's slot so it can keep overwriting
        let bgr = { shared.bgr_cam.lock().unwrap().clone() };
        let Some(bgr) = bgr else {
            std::thread::sleep(std::time::Duration::from_millis(1));
            continue;
        };
        let (cfg, mask) = *shared.cfg.lock().unwrap();

        let snapshot = convert_frame(bgr, cfg, mask, shared.frame_w, shared.frame_h);
        *shared.published.lock().unwrap() = Some(snapshot);
    }
    debug!("frame processor done");
}

fn convert_frame(
    bgr: RgbFrame,
    cfg: ProcessingConfig,
    mask: MaskRect,
    frame_w: u32,
    frame_h: u32,
) -> Snapshot {
    let cropped = arena_imops::crop(&bgr, mask.x1, mask.y1, mask.width(), mask.height());
    let gray = arena_imops::rgb_to_gray(&cropped);
    let thresh = arena_imops::binary_threshold(gray.clone(), cfg.threshold);
    let mut edges = arena_imops::canny(&thresh, cfg.canny_min, cfg.canny_max);
    if cfg.after_canny_threshold > 0 {
        edges = arena_imops::binary_threshold(edges, cfg.after_canny_threshold);
    }
    let mut edges_full = arena_imops::zeros(frame_w, frame_h);
    arena_imops::blit(&edges, &mut edges_full, mask.x1, mask.y1);

    Snapshot {
        bgr,
        gray,
        thresh,
        edges_small: edges,
        edges_full,
        mask_offset: (mask.x1, mask.y1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimCamera;
    use machine_vision_formats::{ImageData, ImageMutData, Stride};

    fn wait_for_snapshot(source: &FrameSource) -> Snapshot {
        for _ in 0..500 {
            if let Ok(s) = source.snapshot() {
                return s;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("no snapshot within five seconds");
    }

    #[test]
    fn snapshot_images_are_mask_sized() {
        let cam = SimCamera::uniform(64, 48, [0, 0, 0]);
        let mut source = FrameSource::new(
            Box::new(cam),
            ProcessingConfig::default(),
            (32, 16),
        );
        let snap = wait_for_snapshot(&source);
        assert_eq!((snap.gray.width(), snap.gray.height()), (32, 16));
        assert_eq!((snap.thresh.width(), snap.thresh.height()), (32, 16));
        assert_eq!((snap.edges_small.width(), snap.edges_small.height()), (32, 16));
        assert_eq!((snap.edges_full.width(), snap.edges_full.height()), (64, 48));
        assert_eq!((snap.bgr.width(), snap.bgr.height()), (64, 48));
        assert_eq!(snap.mask_offset, (16, 16));
        source.stop();
    }

    #[test]
    fn oversized_mask_covers_the_whole_frame() {
        let mask = MaskRect::centred(64, 48, 100, 100);
        assert_eq!(
            mask,
            MaskRect {
                x1: 0,
                y1: 0,
                x2: 64,
                y2: 48
            }
        );
    }

    #[test]
    fn readers_fail_before_first_snapshot() {
        // a camera that never produces
        struct NeverCamera;
        impl crate::ArenaCamera for NeverCamera {
            fn width(&self) -> u32 {
                8
            }
            fn height(&self) -> u32 {
                8
            }
            fn next_frame(&mut self) -> crate::Result<RgbFrame> {
                std::thread::sleep(std::time::Duration::from_millis(5));
                Err(crate::Error::CaptureFailed {
                    msg: "no signal".into(),
                })
            }
            fn feature_float(&self, _prop: CamProp) -> f64 {
                FEATURE_UNSUPPORTED
            }
            fn set_feature_float(&mut self, prop: CamProp, _value: f64) -> crate::Result<()> {
                Err(Error::FeatureNotSupported(prop))
            }
        }

        let mut source = FrameSource::new(
            Box::new(NeverCamera),
            ProcessingConfig::default(),
            (8, 8),
        );
        assert!(matches!(source.read_bgr(), Err(Error::NotReady)));
        assert!(matches!(source.snapshot(), Err(Error::NotReady)));
        // unsupported props report false
        assert!(!source.set_cap(CamProp::Brightness, 1.0));
        source.stop();
    }

    #[test]
    fn thresholded_scene_separates_bright_square() {
        let mut frame = arena_imops::zeros::<machine_vision_formats::pixel_format::RGB8>(40, 40);
        // bright 10×10 square at (10, 10)
        {
            let stride = frame.stride();
            let data = frame.buffer_mut_ref().data;
            for y in 10..20usize {
                for x in 10..20usize {
                    let at = y * stride + x * 3;
                    data[at] = 255;
                    data[at + 1] = 255;
                    data[at + 2] = 255;
                }
            }
        }
        let cam = SimCamera::from_frames(vec![frame]);
        let mut source = FrameSource::new(
            Box::new(cam),
            ProcessingConfig::default(),
            (40, 40),
        );
        let snap = wait_for_snapshot(&source);

        let stride = snap.thresh.stride();
        let data = snap.thresh.image_data();
        assert_eq!(data[15 * stride + 15], 255);
        assert_eq!(data[5 * stride + 5], 0);

        // edge pixels appear around the square in the full-frame embedding
        let edges = snap.edges_full.image_data();
        let estride = snap.edges_full.stride();
        let any_edge = (8..22).any(|y| (8..22).any(|x| edges[y * estride + x] == 255));
        assert!(any_edge);
        source.stop();
    }
}
