//! Contour extraction and planar geometry for binary edge maps.
//!
//! [`find_contours`] implements the Suzuki–Abe border-following algorithm
//! with the two retrieval modes the arena pipeline needs: outermost borders
//! only, or every border with hierarchy. The geometry helpers
//! ([`min_enclosing_circle`], [`min_area_rect`], [`point_polygon_test`])
//! cover the planar measurements the robot detector makes on those
//! contours.

use machine_vision_formats::{pixel_format::Mono8, ImageStride};
use nalgebra::Point2;

mod geom;
pub use geom::{min_area_rect, min_enclosing_circle, point_polygon_test, RotatedRect};

/// Which borders [`find_contours`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Only outermost outer borders (no border nested inside another).
    External,
    /// Every border, outer and hole, with parent links.
    Tree,
}

/// One traced border.
#[derive(Debug, Clone)]
pub struct Contour {
    /// Border pixels in trace order.
    pub points: Vec<Point2<f64>>,
    /// True for a hole border (inner rim of a region).
    pub is_hole: bool,
    /// Index of the enclosing contour in the returned list, if any.
    pub parent: Option<usize>,
}

// Clockwise Moore neighbourhood, matching the paper's examination order.
const NEIGHBORS: [(i32, i32); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

fn neighbor_index(from: (i32, i32), to: (i32, i32)) -> usize {
    let d = (to.0 - from.0, to.1 - from.1);
    NEIGHBORS.iter().position(|&n| n == d).unwrap()
}

struct BorderInfo {
    contour_index: Option<usize>,
    is_hole: bool,
    parent_nbd: i32,
}

/// Trace the borders of all nonzero regions of a binary image.
///
/// Points are reported in image pixel coordinates. Everything beyond the
/// image bounds counts as background, so regions touching the edge are
/// still traced.
pub fn find_contours<IM>(im: &IM, mode: RetrievalMode) -> Vec<Contour>
where
    IM: ImageStride<Mono8>,
{
    let w = im.width() as i32;
    let h = im.height() as i32;
    let stride = im.stride();
    let data = im.image_data();

    // working label image: 1 for foreground, 0 for background
    let mut f = vec![0i32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            if data[y as usize * stride + x as usize] != 0 {
                f[(y * w + x) as usize] = 1;
            }
        }
    }
    let at = |f: &[i32], y: i32, x: i32| -> i32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0
        } else {
            f[(y * w + x) as usize]
        }
    };

    let mut contours: Vec<Contour> = Vec::new();
    // border bookkeeping by NBD; entries 0 and 1 are the frame
    let mut borders: Vec<BorderInfo> = vec![
        BorderInfo {
            contour_index: None,
            is_hole: true,
            parent_nbd: 0,
        },
        BorderInfo {
            contour_index: None,
            is_hole: true,
            parent_nbd: 0,
        },
    ];
    let mut nbd: i32 = 1;

    for y in 0..h {
        let mut lnbd: i32 = 1;
        for x in 0..w {
            let fij = at(&f, y, x);
            if fij == 0 {
                continue;
            }

            let outer_start = fij == 1 && at(&f, y, x - 1) == 0;
            let hole_start = fij >= 1 && at(&f, y, x + 1) == 0;

            if outer_start || hole_start {
                let is_hole = !outer_start;
                nbd += 1;
                let start_neighbor = if is_hole { (y, x + 1) } else { (y, x - 1) };
                if is_hole && fij > 1 {
                    lnbd = fij;
                }

                // decide the parent from the last border met on this row
                let lnbd_info = &borders[lnbd as usize];
                let parent_nbd = if is_hole == lnbd_info.is_hole {
                    lnbd_info.parent_nbd
                } else {
                    lnbd
                };

                let points = trace_border(&mut f, w, h, (y, x), start_neighbor, nbd);
                borders.push(BorderInfo {
                    contour_index: Some(contours.len()),
                    is_hole,
                    parent_nbd,
                });
                contours.push(Contour {
                    points,
                    is_hole,
                    parent: None,
                });
            }

            let fij = at(&f, y, x);
            if fij != 1 {
                lnbd = fij.abs();
            }
        }
    }

    // resolve parent NBDs to contour indices
    let links: Vec<(usize, Option<usize>)> = borders
        .iter()
        .skip(2)
        .filter_map(|info| {
            info.contour_index.map(|ci| {
                let parent = borders
                    .get(info.parent_nbd as usize)
                    .and_then(|p| p.contour_index);
                (ci, parent)
            })
        })
        .collect();
    for (ci, parent) in links {
        contours[ci].parent = parent;
    }

    match mode {
        RetrievalMode::Tree => contours,
        RetrievalMode::External => {
            // outermost outer borders only, re-rooted with no parents
            let keep: Vec<Contour> = contours
                .iter()
                .filter(|c| !c.is_hole && c.parent.is_none())
                .map(|c| Contour {
                    points: c.points.clone(),
                    is_hole: false,
                    parent: None,
                })
                .collect();
            keep
        }
    }
}

/// Follow one border starting at `start`, marking visited pixels with `nbd`.
fn trace_border(
    f: &mut [i32],
    w: i32,
    h: i32,
    start: (i32, i32),
    start_neighbor: (i32, i32),
    nbd: i32,
) -> Vec<Point2<f64>> {
    let at = |f: &[i32], y: i32, x: i32| -> i32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0
        } else {
            f[(y * w + x) as usize]
        }
    };
    let set = |f: &mut [i32], y: i32, x: i32, v: i32| {
        f[(y * w + x) as usize] = v;
    };

    let (i, j) = start;
    let mut points = Vec::new();

    // (3.1) scan clockwise from the start neighbour for a nonzero pixel
    let start_idx = neighbor_index((i, j), (start_neighbor.0, start_neighbor.1));
    let mut found = None;
    for k in 0..8 {
        let (dy, dx) = NEIGHBORS[(start_idx + k) % 8];
        if at(f, i + dy, j + dx) != 0 {
            found = Some((i + dy, j + dx));
            break;
        }
    }
    let Some((i1, j1)) = found else {
        // isolated pixel
        set(f, i, j, -nbd);
        points.push(Point2::new(j as f64, i as f64));
        return points;
    };

    // (3.2)
    let mut i2j2 = (i1, j1);
    let mut i3j3 = (i, j);

    loop {
        // (3.3) counterclockwise from the element after i2j2 around i3j3
        let from_idx = neighbor_index(i3j3, i2j2);
        let mut examined_right_zero = false;
        let mut next = None;
        for k in 1..=8 {
            let idx = (from_idx + 8 - (k % 8)) % 8;
            let (dy, dx) = NEIGHBORS[idx];
            let (ny, nx) = (i3j3.0 + dy, i3j3.1 + dx);
            if at(f, ny, nx) != 0 {
                next = Some((ny, nx));
                break;
            }
            if (dy, dx) == (0, 1) {
                examined_right_zero = true;
            }
        }
        let (i4, j4) = next.unwrap();

        // (3.4) marking policy
        let cur = at(f, i3j3.0, i3j3.1);
        if examined_right_zero {
            set(f, i3j3.0, i3j3.1, -nbd);
        } else if cur == 1 {
            set(f, i3j3.0, i3j3.1, nbd);
        }
        points.push(Point2::new(i3j3.1 as f64, i3j3.0 as f64));

        // (3.5) back at the start in the original configuration?
        if (i4, j4) == (i, j) && i3j3 == (i1, j1) {
            break;
        }
        i2j2 = i3j3;
        i3j3 = (i4, j4);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_imops::zeros;
    use machine_vision_formats::{owned::OImage, ImageData, ImageMutData, Stride};

    fn set_px(im: &mut OImage<Mono8>, x: usize, y: usize) {
        let stride = im.stride();
        im.buffer_mut_ref().data[y * stride + x] = 255;
    }

    fn draw_rect_outline(im: &mut OImage<Mono8>, x0: usize, y0: usize, x1: usize, y1: usize) {
        for x in x0..=x1 {
            set_px(im, x, y0);
            set_px(im, x, y1);
        }
        for y in y0..=y1 {
            set_px(im, x0, y);
            set_px(im, x1, y);
        }
    }

    fn draw_disc(im: &mut OImage<Mono8>, cx: f64, cy: f64, r: f64) {
        let stride = im.stride();
        let w = im.width() as usize;
        let h = im.height() as usize;
        let data = im.buffer_mut_ref().data;
        for y in 0..h {
            for x in 0..w {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                if (dx * dx + dy * dy).sqrt() <= r {
                    data[y * stride + x] = 255;
                }
            }
        }
    }

    #[test]
    fn single_rectangle_outline_is_one_external_contour() {
        let mut im = zeros::<Mono8>(64, 64);
        draw_rect_outline(&mut im, 10, 12, 40, 36);
        let found = find_contours(&im, RetrievalMode::External);
        assert_eq!(found.len(), 1);

        // the outer border covers the full extent of the rectangle
        let xs: Vec<f64> = found[0].points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = found[0].points.iter().map(|p| p.y).collect();
        assert_eq!(xs.iter().cloned().fold(f64::MAX, f64::min), 10.0);
        assert_eq!(xs.iter().cloned().fold(f64::MIN, f64::max), 40.0);
        assert_eq!(ys.iter().cloned().fold(f64::MAX, f64::min), 12.0);
        assert_eq!(ys.iter().cloned().fold(f64::MIN, f64::max), 36.0);
    }

    #[test]
    fn nested_blob_is_hidden_from_external_mode() {
        let mut im = zeros::<Mono8>(64, 64);
        draw_rect_outline(&mut im, 5, 5, 58, 58);
        draw_disc(&mut im, 30.0, 30.0, 4.0);

        let external = find_contours(&im, RetrievalMode::External);
        assert_eq!(external.len(), 1);

        let tree = find_contours(&im, RetrievalMode::Tree);
        assert!(tree.len() > 1, "tree mode must include the nested blob");

        // some tree contour sits around (30, 30)
        let near_disc = tree.iter().any(|c| {
            c.points
                .iter()
                .all(|p| (p.x - 30.0).abs() <= 6.0 && (p.y - 30.0).abs() <= 6.0)
        });
        assert!(near_disc);
    }

    #[test]
    fn two_separate_blobs_are_two_external_contours() {
        let mut im = zeros::<Mono8>(64, 64);
        draw_disc(&mut im, 15.0, 15.0, 5.0);
        draw_disc(&mut im, 45.0, 45.0, 5.0);
        let found = find_contours(&im, RetrievalMode::External);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn hole_border_has_a_parent_in_tree_mode() {
        let mut im = zeros::<Mono8>(32, 32);
        // a filled square has an outer border; carving a hole adds a hole
        // border parented to it
        for y in 8..24 {
            for x in 8..24 {
                set_px(&mut im, x, y);
            }
        }
        let stride = im.stride();
        for y in 14..18 {
            for x in 14..18 {
                im.buffer_mut_ref().data[y * stride + x] = 0;
            }
        }
        let tree = find_contours(&im, RetrievalMode::Tree);
        assert_eq!(tree.len(), 2);
        let hole = tree.iter().position(|c| c.is_hole).unwrap();
        let outer = tree.iter().position(|c| !c.is_hole).unwrap();
        assert_eq!(tree[hole].parent, Some(outer));
    }

    #[test]
    fn isolated_pixel_is_a_single_point_contour() {
        let mut im = zeros::<Mono8>(16, 16);
        set_px(&mut im, 7, 9);
        let found = find_contours(&im, RetrievalMode::External);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].points.len(), 1);
        assert_eq!(found[0].points[0], Point2::new(7.0, 9.0));
    }
}
