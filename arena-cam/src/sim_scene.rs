//! The simulated arena used when no camera backend is compiled in.
//!
//! Two robot plates on a dark floor: bright top faces, dark id dots, and a
//! dark direction marker each, sized to the default detection gates.

use arena_camera::{RgbFrame, SimCamera};
use machine_vision_formats::{ImageMutData, Stride};

const SCENE_W: u32 = 960;
const SCENE_H: u32 = 540;

fn fill_plate(frame: &mut RgbFrame, centre: (i64, i64), size: i64, holes: &[(i64, i64, f64)]) {
    let stride = frame.stride();
    let data = frame.buffer_mut_ref().data;
    let half = size / 2;
    for y in (centre.1 - half)..=(centre.1 + half) {
        for x in (centre.0 - half)..=(centre.0 + half) {
            let dark = holes.iter().any(|(hx, hy, hr)| {
                let dx = (x - hx) as f64;
                let dy = (y - hy) as f64;
                (dx * dx + dy * dy).sqrt() <= *hr
            });
            if !dark {
                let at = y as usize * stride + x as usize * 3;
                data[at] = 230;
                data[at + 1] = 230;
                data[at + 2] = 230;
            }
        }
    }
}

/// A static scene with robot 2 facing east and robot 3 facing north.
pub fn demo_camera() -> SimCamera {
    let mut frame = arena_imops::zeros(SCENE_W, SCENE_H);

    // robot with two id dots, marker east of centre
    fill_plate(
        &mut frame,
        (300, 270),
        100,
        &[(280, 250, 3.0), (320, 290, 3.0), (325, 270, 7.0)],
    );
    // robot with three id dots, marker north of centre
    fill_plate(
        &mut frame,
        (650, 270),
        100,
        &[
            (630, 250, 3.0),
            (630, 290, 3.0),
            (672, 292, 3.0),
            (650, 245, 7.0),
        ],
    );

    SimCamera::from_frames(vec![frame])
}
