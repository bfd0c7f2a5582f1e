//! Per-robot state for one processed frame.
//!
//! A [`Robot`] is constructed empty by the detector and progressively
//! populated: location and bounding contour first, then the direction
//! marker and id dots as the smaller contours are classified. Everything is
//! discarded on the next frame; identity is rederived from the visible dot
//! count every time.

use arena_types::{Rgb, RobotId};
use nalgebra::Point2;

use crate::{Error, Result};

/// Detections closer together than this are the same physical feature.
pub const JITTER: f64 = 10.0;

/// Default outline color until the robot's id (and so its team) is known.
pub const UNIDENTIFIED_COLOR: Rgb = Rgb(0, 255, 255);

/// Robots 1–4 are the blue team, 5 and up the red team.
pub fn team_color(id: RobotId) -> Rgb {
    if id <= 4 {
        Rgb(0, 0, 255)
    } else {
        Rgb(255, 0, 0)
    }
}

fn distance(a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a - b).norm()
}

/// The binding surface the feature pass works against: anything with a
/// bounding contour that markers and dots can be attached to.
pub trait ContourBound {
    /// Point-in-polygon test against the bounding contour; the boundary
    /// counts as inside.
    fn contour_contains(&self, pt: Point2<f64>) -> bool;
    /// Attach a direction marker. False when the point is outside the
    /// contour or a duplicate within [`JITTER`] of the current marker.
    fn set_marker(&mut self, pt: Point2<f64>) -> bool;
    /// Attach an id dot. False when the point is outside the contour or
    /// within [`JITTER`] of an existing dot.
    fn add_id_dot(&mut self, pt: Point2<f64>) -> bool;
}

#[derive(Debug, Clone)]
pub struct Robot {
    location: Option<Point2<f64>>,
    radius: f64,
    contour: Option<[Point2<f64>; 4]>,
    marker: Option<Point2<f64>>,
    dots: Vec<Point2<f64>>,
    id: Option<RobotId>,
    pub color: Rgb,
    pub text_color: Rgb,
}

impl Default for Robot {
    fn default() -> Self {
        Robot {
            location: None,
            radius: 0.0,
            contour: None,
            marker: None,
            dots: Vec::new(),
            id: None,
            color: UNIDENTIFIED_COLOR,
            text_color: Rgb(255, 255, 255),
        }
    }
}

impl Robot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the robot centre. Once-only; a second call fails.
    pub fn set_location(&mut self, pos: Point2<f64>) -> Result<()> {
        if self.location.is_some() {
            return Err(Error::AlreadySet);
        }
        self.location = Some(pos);
        Ok(())
    }

    pub fn location(&self) -> Option<Point2<f64>> {
        self.location
    }

    /// Radius of the enclosing circle, used for annotation placement.
    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Store the rotated-rectangle vertices bounding the robot.
    pub fn set_contour(&mut self, points: [Point2<f64>; 4]) {
        self.contour = Some(points);
    }

    pub fn contour(&self) -> Option<&[Point2<f64>; 4]> {
        self.contour.as_ref()
    }

    pub fn marker(&self) -> Option<Point2<f64>> {
        self.marker
    }

    pub fn dots(&self) -> &[Point2<f64>] {
        &self.dots
    }

    /// The robot id: the number of id dots bound so far, or None if none
    /// were.
    pub fn id(&self) -> Option<RobotId> {
        self.id
    }

    /// Nautical heading in whole degrees, `[0, 360)`: 0 when the marker sits
    /// directly above the centre (image "north"), 90 to the right,
    /// clockwise. None until a marker is bound.
    pub fn heading(&self) -> Option<u16> {
        let marker = self.marker?;
        let loc = self.location?;

        // image y grows downward, so atan2 of raw differences measures
        // clockwise from screen east; the offset below re-bases to north
        let angle = (marker.y - loc.y).atan2(marker.x - loc.x);
        let deg = angle.to_degrees().round() as i32;

        let heading = if deg < 0 { (450 + deg) % 360 } else { (90 + deg) % 360 };
        Some(heading as u16)
    }
}

impl ContourBound for Robot {
    fn contour_contains(&self, pt: Point2<f64>) -> bool {
        match &self.contour {
            None => false,
            Some(contour) => arena_contour::point_polygon_test(contour, pt) >= 0.0,
        }
    }

    fn set_marker(&mut self, pt: Point2<f64>) -> bool {
        if !self.contour_contains(pt) {
            return false;
        }
        if let Some(existing) = self.marker {
            if distance(existing, pt) <= JITTER {
                return false;
            }
        }
        self.marker = Some(pt);
        true
    }

    fn add_id_dot(&mut self, pt: Point2<f64>) -> bool {
        if !self.contour_contains(pt) {
            return false;
        }
        if self.dots.iter().any(|dot| distance(*dot, pt) <= JITTER) {
            return false;
        }
        self.dots.push(pt);
        self.id = Some(self.dots.len() as RobotId);
        true
    }
}
