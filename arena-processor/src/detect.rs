//! The two contour-classification passes over one edge map.
//!
//! The bot pass works on external contours only and gates candidates by
//! rotated-rectangle area and aspect ratio. The feature pass works on the
//! full contour tree and classifies the small contours by enclosing-circle
//! radius: director sizes first, dot sizes second, in two separate
//! traversals so a director is never also counted as a dot.

use nalgebra::{Point2, Vector2};

use arena_contour::{min_area_rect, min_enclosing_circle, Contour};

use crate::robot::{ContourBound, Robot};

/// Acceptance gates for the bot pass, in pixels².
#[derive(Debug, Clone, Copy)]
pub struct BotGates {
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
}

/// Radius gates for the feature pass, in pixels.
#[derive(Debug, Clone, Copy)]
pub struct FeatureGates {
    pub min_dot_r: f64,
    pub max_dot_r: f64,
    pub min_director_r: f64,
    pub max_director_r: f64,
}

impl FeatureGates {
    /// Director sizes claim the half-open `[min, max)` band.
    fn is_director(&self, r: f64) -> bool {
        r >= self.min_director_r && r < self.max_director_r
    }

    fn is_dot(&self, r: f64) -> bool {
        !self.is_director(r) && r >= self.min_dot_r && r <= self.max_dot_r
    }
}

/// Bot pass: build robot records from the external contours of an edge map.
///
/// A contour survives when its rotated bounding rectangle is inside both
/// gate ranges (boundary values included) and no previously accepted robot's
/// contour already contains its centre. Coordinates are shifted by
/// `mask_offset` into full-frame pixels.
pub fn find_robots(contours: &[Contour], gates: &BotGates, mask_offset: (f64, f64)) -> Vec<Robot> {
    let offset = Vector2::new(mask_offset.0, mask_offset.1);
    let mut bots: Vec<Robot> = Vec::new();

    for contour in contours {
        if contour.points.is_empty() {
            continue;
        }
        let rect = min_area_rect(&contour.points);
        let aspect = rect.aspect_ratio();
        if aspect < gates.min_aspect || aspect > gates.max_aspect {
            continue;
        }
        let area = rect.area();
        if area < gates.min_area || area > gates.max_area {
            continue;
        }

        let (centre, radius) = min_enclosing_circle(&contour.points);
        let centre = centre + offset;
        let corners = rect.box_points().map(|p| p + offset);

        // a centre inside an accepted robot is the same robot seen again
        if bots.iter().any(|bot| bot.contour_contains(centre)) {
            continue;
        }

        let mut bot = Robot::new();
        bot.set_location(centre).expect("fresh robot");
        bot.set_radius(radius);
        bot.set_contour(corners);
        bots.push(bot);
    }
    bots
}

/// Feature pass: bind direction markers and id dots to the robots.
///
/// Runs over the full contour tree. Directors are bound in a first
/// traversal, dots in a second; for each feature the first robot that
/// accepts it wins.
pub fn bind_features(
    contours: &[Contour],
    bots: &mut [Robot],
    gates: &FeatureGates,
    mask_offset: (f64, f64),
) {
    let offset = Vector2::new(mask_offset.0, mask_offset.1);
    let circles: Vec<(Point2<f64>, f64)> = contours
        .iter()
        .filter(|c| !c.points.is_empty())
        .map(|c| min_enclosing_circle(&c.points))
        .collect();

    for (centre, r) in &circles {
        if gates.is_director(*r) {
            let pt = *centre + offset;
            for bot in bots.iter_mut() {
                if bot.set_marker(pt) {
                    break;
                }
            }
        }
    }

    for (centre, r) in &circles {
        if gates.is_dot(*r) {
            let pt = *centre + offset;
            for bot in bots.iter_mut() {
                if bot.add_id_dot(pt) {
                    break;
                }
            }
        }
    }
}
