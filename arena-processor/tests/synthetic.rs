//! Deterministic detection scenarios on synthetic images.
//!
//! The first half drives the two detection passes directly with hand-drawn
//! edge maps; the second half runs the whole pipeline (camera workers,
//! preprocessing, detection) against a simulated camera.

use arena_camera::{MonoFrame, RgbFrame, SimCamera};
use arena_contour::{find_contours, point_polygon_test, RetrievalMode};
use arena_params::{names, ParamStore};
use arena_processor::{
    detect::{bind_features, find_robots},
    ArenaLocator, BotGates, FeatureGates, LocatorConfig, Robot,
};
use machine_vision_formats::{ImageData, ImageMutData, Stride};

fn default_bot_gates() -> BotGates {
    BotGates {
        min_area: 2500.0,
        max_area: 25000.0,
        min_aspect: 0.5,
        max_aspect: 1.0,
    }
}

fn default_feature_gates() -> FeatureGates {
    FeatureGates {
        min_dot_r: 1.0,
        max_dot_r: 10.0,
        min_director_r: 6.0,
        max_director_r: 10.0,
    }
}

fn set_mono(im: &mut MonoFrame, x: i64, y: i64) {
    if x < 0 || y < 0 || x >= i64::from(im.width()) || y >= i64::from(im.height()) {
        return;
    }
    let stride = im.stride();
    im.buffer_mut_ref().data[y as usize * stride + x as usize] = 255;
}

/// 1-px rectangle outline centred at `(cx, cy)`.
fn draw_rect_outline(im: &mut MonoFrame, cx: i64, cy: i64, w: i64, h: i64) {
    let (x0, y0) = (cx - w / 2, cy - h / 2);
    let (x1, y1) = (x0 + w, y0 + h);
    for x in x0..=x1 {
        set_mono(im, x, y0);
        set_mono(im, x, y1);
    }
    for y in y0..=y1 {
        set_mono(im, x0, y);
        set_mono(im, x1, y);
    }
}

/// Dense 1-px circle outline.
fn draw_ring(im: &mut MonoFrame, cx: f64, cy: f64, r: f64) {
    let steps = ((r * 16.0) as i64).max(32);
    for k in 0..steps {
        let a = k as f64 * std::f64::consts::TAU / steps as f64;
        set_mono(
            im,
            (cx + r * a.cos()).round() as i64,
            (cy + r * a.sin()).round() as i64,
        );
    }
}

fn edge_map(w: u32, h: u32) -> MonoFrame {
    arena_imops::zeros(w, h)
}

fn detect_all(edges: &MonoFrame) -> Vec<Robot> {
    let external = find_contours(edges, RetrievalMode::External);
    let mut bots = find_robots(&external, &default_bot_gates(), (0.0, 0.0));
    let tree = find_contours(edges, RetrievalMode::Tree);
    bind_features(&tree, &mut bots, &default_feature_gates(), (0.0, 0.0));
    bots
}

#[test]
fn single_bot_without_features() {
    let mut edges = edge_map(1920, 1080);
    draw_rect_outline(&mut edges, 960, 540, 80, 80);

    let bots = detect_all(&edges);
    assert_eq!(bots.len(), 1);
    assert_eq!(bots[0].id(), None);
    assert_eq!(bots[0].heading(), None);

    let loc = bots[0].location().unwrap();
    assert!((loc.x - 960.0).abs() <= 1.0);
    assert!((loc.y - 540.0).abs() <= 1.0);
}

#[test]
fn one_bot_with_two_dots() {
    let mut edges = edge_map(1920, 1080);
    draw_rect_outline(&mut edges, 960, 540, 80, 80);
    draw_ring(&mut edges, 950.0, 535.0, 4.0);
    draw_ring(&mut edges, 970.0, 545.0, 4.0);

    let bots = detect_all(&edges);
    assert_eq!(bots.len(), 1);
    assert_eq!(bots[0].id(), Some(2));
    assert_eq!(bots[0].heading(), None);
}

#[test]
fn full_id_three_with_marker_east() {
    let mut edges = edge_map(1024, 1024);
    draw_rect_outline(&mut edges, 500, 500, 120, 120);
    draw_ring(&mut edges, 470.0, 470.0, 3.0);
    draw_ring(&mut edges, 500.0, 530.0, 3.0);
    draw_ring(&mut edges, 530.0, 470.0, 3.0);
    draw_ring(&mut edges, 550.0, 500.0, 8.0); // marker, east of centre

    let bots = detect_all(&edges);
    assert_eq!(bots.len(), 1);
    let bot = &bots[0];
    assert_eq!(bot.id(), Some(3));
    assert_eq!(bot.heading(), Some(90));
}

#[test]
fn marker_north_gives_heading_zero() {
    let mut edges = edge_map(1024, 1024);
    draw_rect_outline(&mut edges, 500, 500, 120, 120);
    draw_ring(&mut edges, 470.0, 470.0, 3.0);
    draw_ring(&mut edges, 500.0, 530.0, 3.0);
    draw_ring(&mut edges, 530.0, 470.0, 3.0);
    draw_ring(&mut edges, 500.0, 450.0, 8.0); // marker, north of centre

    let bots = detect_all(&edges);
    assert_eq!(bots.len(), 1);
    assert_eq!(bots[0].heading(), Some(0));
}

#[test]
fn overlapping_bots_collapse_to_one() {
    let mut edges = edge_map(1920, 1080);
    draw_rect_outline(&mut edges, 500, 500, 80, 80);
    draw_rect_outline(&mut edges, 505, 500, 80, 80);

    let bots = detect_all(&edges);
    assert_eq!(bots.len(), 1);
}

#[test]
fn sliver_aspect_is_rejected() {
    let mut edges = edge_map(1920, 1080);
    draw_rect_outline(&mut edges, 960, 540, 200, 20);

    let bots = detect_all(&edges);
    assert_eq!(bots.len(), 0);
}

#[test]
fn bound_features_lie_inside_their_contour() {
    let mut edges = edge_map(1024, 1024);
    draw_rect_outline(&mut edges, 500, 500, 120, 120);
    draw_ring(&mut edges, 470.0, 470.0, 3.0);
    draw_ring(&mut edges, 530.0, 530.0, 3.0);
    draw_ring(&mut edges, 540.0, 500.0, 8.0);

    let bots = detect_all(&edges);
    let bot = &bots[0];
    let contour = bot.contour().unwrap();
    for dot in bot.dots() {
        assert!(point_polygon_test(contour, *dot) >= 0.0);
    }
    if let Some(marker) = bot.marker() {
        assert!(point_polygon_test(contour, marker) >= 0.0);
    }
}

// ---- full pipeline through a simulated camera ----

fn white_plate_frame(
    w: u32,
    h: u32,
    plate_centre: (i64, i64),
    plate_size: i64,
    holes: &[(i64, i64, f64)],
) -> RgbFrame {
    let mut frame = arena_imops::zeros::<machine_vision_formats::pixel_format::RGB8>(w, h);
    let stride = frame.stride();
    let data = frame.buffer_mut_ref().data;

    let (cx, cy) = plate_centre;
    let half = plate_size / 2;
    for y in (cy - half)..=(cy + half) {
        for x in (cx - half)..=(cx + half) {
            let dark = holes.iter().any(|(hx, hy, hr)| {
                let dx = (x - hx) as f64;
                let dy = (y - hy) as f64;
                (dx * dx + dy * dy).sqrt() <= *hr
            });
            if !dark {
                let at = y as usize * stride + x as usize * 3;
                data[at] = 255;
                data[at + 1] = 255;
                data[at + 2] = 255;
            }
        }
    }
    frame
}

fn params_for(w: u32, h: u32) -> ParamStore {
    let params = ParamStore::new();
    params.set(names::FRAME_WIDTH, w as f64);
    params.set(names::FRAME_HEIGHT, h as f64);
    params.set(names::ARENA_MASK_SIZE, (w as f64, h as f64));
    params
}

fn updated(locator: &mut ArenaLocator) {
    for _ in 0..500 {
        match locator.update() {
            Ok(_) => return,
            Err(arena_processor::Error::NotReady) => {
                std::thread::sleep(std::time::Duration::from_millis(10))
            }
            Err(e) => panic!("update failed: {e}"),
        }
    }
    panic!("pipeline did not become ready");
}

#[test]
fn pipeline_reports_plate_without_dots_as_anonymous() {
    let frame = white_plate_frame(320, 240, (160, 120), 100, &[]);
    let camera = SimCamera::from_frames(vec![frame]);
    let mut locator = ArenaLocator::new(
        Box::new(camera),
        params_for(320, 240),
        LocatorConfig::default(),
    )
    .unwrap();

    updated(&mut locator);
    assert_eq!(locator.bots_found().len(), 1);
    assert_eq!(locator.bots_found()[0].id(), None);
    assert!(locator.get_robots().is_empty());
    locator.stop();
}

#[test]
fn pipeline_finds_id_and_heading_and_scales_to_mm() {
    // white 100×100 plate with two dark id dots and a dark direction
    // marker east of centre
    let frame = white_plate_frame(
        320,
        240,
        (160, 120),
        100,
        &[
            (140, 100, 3.0),
            (180, 140, 3.0),
            (185, 120, 7.0), // marker
        ],
    );
    let camera = SimCamera::from_frames(vec![frame]);
    let params = params_for(320, 240);
    params.set(names::CAMERA_SCALE, 2.0);
    let mut locator =
        ArenaLocator::new(Box::new(camera), params, LocatorConfig::default()).unwrap();

    updated(&mut locator);
    assert_eq!(locator.bots_found().len(), 1);
    let bot = &locator.bots_found()[0];
    assert_eq!(bot.id(), Some(2));

    let heading = bot.heading().expect("marker bound");
    assert!(
        (45..135).contains(&heading),
        "marker east of centre should head roughly east, got {heading}"
    );

    // exact pixel→mm conversion contract
    let loc = bot.location().unwrap();
    let robots = locator.get_robots();
    let pose = robots.get(&2).expect("robot 2 reported");
    assert_eq!(pose.x_mm, (loc.x * 2.0).round() as i32);
    assert_eq!(pose.y_mm, (loc.y * 2.0).round() as i32);
    assert_eq!(pose.heading, Some(heading));
    locator.stop();
}

#[test]
fn enclosing_circles_of_reported_bots_never_overlap() {
    // two well-separated plates
    let mut frame = white_plate_frame(400, 240, (100, 120), 80, &[]);
    {
        let stride = frame.stride();
        let data = frame.buffer_mut_ref().data;
        for y in 80..160usize {
            for x in 260..340usize {
                let at = y * stride + x * 3;
                data[at] = 255;
                data[at + 1] = 255;
                data[at + 2] = 255;
            }
        }
    }
    let camera = SimCamera::from_frames(vec![frame]);
    let mut locator = ArenaLocator::new(
        Box::new(camera),
        params_for(400, 240),
        LocatorConfig::default(),
    )
    .unwrap();

    updated(&mut locator);
    let bots = locator.bots_found();
    assert_eq!(bots.len(), 2);
    let a = bots[0].location().unwrap();
    let b = bots[1].location().unwrap();
    let dist = (a - b).norm();
    assert!(dist > bots[0].radius() + bots[1].radius());
    locator.stop();
}
