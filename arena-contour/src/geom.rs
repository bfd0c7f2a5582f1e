//! Planar geometry over point sets: smallest enclosing circle, minimum-area
//! rotated rectangle, and the signed point-in-polygon test.

use nalgebra::{Point2, Vector2};

#[derive(Debug, Clone, Copy)]
struct Circle {
    center: Point2<f64>,
    radius: f64,
}

impl Circle {
    fn from_point(p: Point2<f64>) -> Self {
        Circle {
            center: p,
            radius: 0.0,
        }
    }

    fn from_diameter(a: Point2<f64>, b: Point2<f64>) -> Self {
        let center = nalgebra::center(&a, &b);
        Circle {
            center,
            radius: (a - center).norm(),
        }
    }

    fn contains(&self, p: Point2<f64>) -> bool {
        (p - self.center).norm() <= self.radius + 1e-7 * (1.0 + self.radius)
    }
}

fn circumcircle(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Circle {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        // collinear: the farthest pair spans the circle
        let candidates = [
            Circle::from_diameter(a, b),
            Circle::from_diameter(a, c),
            Circle::from_diameter(b, c),
        ];
        return candidates
            .into_iter()
            .max_by(|p, q| p.radius.total_cmp(&q.radius))
            .unwrap();
    }
    let a2 = a.coords.norm_squared();
    let b2 = b.coords.norm_squared();
    let c2 = c.coords.norm_squared();
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let center = Point2::new(ux, uy);
    Circle {
        center,
        radius: (a - center).norm(),
    }
}

/// Smallest circle enclosing all of `points` (Welzl's incremental method).
///
/// Panics: panics on an empty slice.
pub fn min_enclosing_circle(points: &[Point2<f64>]) -> (Point2<f64>, f64) {
    assert!(!points.is_empty());
    let mut circle = Circle::from_point(points[0]);
    for (i, &p) in points.iter().enumerate().skip(1) {
        if circle.contains(p) {
            continue;
        }
        circle = Circle::from_point(p);
        for (j, &q) in points[..i].iter().enumerate() {
            if circle.contains(q) {
                continue;
            }
            circle = Circle::from_diameter(p, q);
            for &r in &points[..j] {
                if !circle.contains(r) {
                    circle = circumcircle(p, q, r);
                }
            }
        }
    }
    (circle.center, circle.radius)
}

/// A rotated bounding rectangle.
#[derive(Debug, Clone, Copy)]
pub struct RotatedRect {
    pub center: Point2<f64>,
    /// Side lengths; no ordering is implied.
    pub size: (f64, f64),
    corners: [Point2<f64>; 4],
}

impl RotatedRect {
    /// The four vertices in order around the rectangle.
    pub fn box_points(&self) -> [Point2<f64>; 4] {
        self.corners
    }

    /// `side1 × side2`.
    pub fn area(&self) -> f64 {
        self.size.0 * self.size.1
    }

    /// `min(side1, side2) / max(side1, side2)`, or 1.0 when a side is zero.
    pub fn aspect_ratio(&self) -> f64 {
        let (a, b) = self.size;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        if lo == 0.0 || hi == 0.0 {
            1.0
        } else {
            lo / hi
        }
    }
}

/// Convex hull, counterclockwise, by Andrew's monotone chain.
fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts: Vec<Point2<f64>> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| a == b);
    if pts.len() < 3 {
        return pts;
    }
    let cross = |o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };
    let half_hull = |points: &mut dyn Iterator<Item = Point2<f64>>| {
        let mut half: Vec<Point2<f64>> = Vec::new();
        for p in points {
            while half.len() >= 2 && cross(&half[half.len() - 2], &half[half.len() - 1], &p) <= 0.0
            {
                half.pop();
            }
            half.push(p);
        }
        half.pop();
        half
    };
    let mut hull = half_hull(&mut pts.iter().copied());
    hull.extend(half_hull(&mut pts.iter().rev().copied()));
    hull
}

/// Minimum-area rectangle (possibly rotated) enclosing all of `points`,
/// found by rotating calipers over the convex hull.
///
/// Panics: panics on an empty slice.
pub fn min_area_rect(points: &[Point2<f64>]) -> RotatedRect {
    assert!(!points.is_empty());
    let hull = convex_hull(points);

    if hull.len() == 1 {
        return RotatedRect {
            center: hull[0],
            size: (0.0, 0.0),
            corners: [hull[0]; 4],
        };
    }
    if hull.len() == 2 {
        let (a, b) = (hull[0], hull[1]);
        return RotatedRect {
            center: nalgebra::center(&a, &b),
            size: ((b - a).norm(), 0.0),
            corners: [a, b, b, a],
        };
    }

    let mut best: Option<(f64, RotatedRect)> = None;
    for k in 0..hull.len() {
        let a = hull[k];
        let b = hull[(k + 1) % hull.len()];
        let edge = b - a;
        let len = edge.norm();
        if len == 0.0 {
            continue;
        }
        let u = edge / len;
        let n = Vector2::new(-u.y, u.x);

        let (mut umin, mut umax) = (f64::MAX, f64::MIN);
        let (mut nmin, mut nmax) = (f64::MAX, f64::MIN);
        for p in &hull {
            let v = *p - a;
            let pu = v.dot(&u);
            let pn = v.dot(&n);
            umin = umin.min(pu);
            umax = umax.max(pu);
            nmin = nmin.min(pn);
            nmax = nmax.max(pn);
        }
        let size = (umax - umin, nmax - nmin);
        let area = size.0 * size.1;
        if best.as_ref().map_or(true, |(b_area, _)| area < *b_area) {
            let corner = |pu: f64, pn: f64| a + u * pu + n * pn;
            let corners = [
                corner(umin, nmin),
                corner(umax, nmin),
                corner(umax, nmax),
                corner(umin, nmax),
            ];
            let center = Point2::from(
                (corners[0].coords + corners[1].coords + corners[2].coords + corners[3].coords)
                    / 4.0,
            );
            best = Some((
                area,
                RotatedRect {
                    center,
                    size,
                    corners,
                },
            ));
        }
    }
    best.unwrap().1
}

/// Signed point-in-polygon test: `1.0` inside, `0.0` on the boundary,
/// `-1.0` outside.
pub fn point_polygon_test(polygon: &[Point2<f64>], pt: Point2<f64>) -> f64 {
    let n = polygon.len();
    if n == 0 {
        return -1.0;
    }

    // boundary check first: distance to any edge within tolerance
    for k in 0..n {
        let a = polygon[k];
        let b = polygon[(k + 1) % n];
        let ab = b - a;
        let ap = pt - a;
        let len2 = ab.norm_squared();
        let t = if len2 == 0.0 {
            0.0
        } else {
            (ap.dot(&ab) / len2).clamp(0.0, 1.0)
        };
        let closest = a + ab * t;
        if (pt - closest).norm() < 1e-9 {
            return 0.0;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > pt.y) != (pj.y > pt.y)
            && pt.x < (pj.x - pi.x) * (pt.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    if inside {
        1.0
    } else {
        -1.0
    }
}
