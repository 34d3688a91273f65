//! Visibility contour and discontinuity extraction.
//!
//! [`ContourSegmenter`] turns one [`LaserScan`] into Cartesian points in the
//! sensor frame and finds every place where two neighbouring visible points
//! jump apart sharply while still close to the sensor.  Each such jump is a
//! [`DiscontinuityPair`]: the nearer point is the visible obstacle edge (the
//! *corner*), the farther one is where the sensor ray landed behind it.
//!
//! # Example
//!
//! ```rust
//! use umbra_perception::contour::{ContourSegmenter, SegmenterParams};
//! use umbra_types::LaserScan;
//!
//! let scan = LaserScan::new(0.0, 0.05, vec![1.0, 3.0]);
//! let contour = ContourSegmenter::new(SegmenterParams::default()).segment(&scan);
//!
//! assert_eq!(contour.discontinuities.len(), 1);
//! assert!((contour.discontinuities[0].corner.x - 1.0).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;
use umbra_types::{LaserScan, Point2};

/// Half-width of the field of view considered (radians).
pub const FOV_LIMIT: f32 = 1.2;
/// Minimum Euclidean gap between neighbours for a discontinuity (metres).
pub const JUMP_THRESHOLD: f32 = 0.15;
/// Minimum per-axis gap between neighbours for a discontinuity (metres).
pub const PROXIMITY_THRESHOLD: f32 = 0.5;
/// The nearer neighbour must lie within this range of the sensor (metres).
pub const MAX_DETECTION_RADIUS: f32 = 5.0;

/// Tunables for [`ContourSegmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterParams {
    pub fov_limit: f32,
    pub jump_threshold: f32,
    pub proximity_threshold: f32,
    pub max_detection_radius: f32,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            fov_limit: FOV_LIMIT,
            jump_threshold: JUMP_THRESHOLD,
            proximity_threshold: PROXIMITY_THRESHOLD,
            max_detection_radius: MAX_DETECTION_RADIUS,
        }
    }
}

/// A visible obstacle edge and the far point seen just past it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscontinuityPair {
    pub corner: Point2,
    pub ray: Point2,
}

impl DiscontinuityPair {
    /// Order two neighbouring contour points into (corner, ray).
    ///
    /// `previous` becomes the corner only when it is strictly nearer to the
    /// sensor than `current`; on equal norms `current` is the corner.
    pub fn from_neighbours(previous: Point2, current: Point2) -> Self {
        if previous.norm() < current.norm() {
            Self {
                corner: previous,
                ray: current,
            }
        } else {
            Self {
                corner: current,
                ray: previous,
            }
        }
    }
}

/// Output of one segmentation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contour {
    /// Every sample converted to Cartesian, regardless of bearing.
    pub full: Vec<Point2>,
    /// Samples inside the field of view, in scan order.
    pub visible: Vec<Point2>,
    /// Discontinuities in discovery order.
    pub discontinuities: Vec<DiscontinuityPair>,
}

/// Stateless scan segmenter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContourSegmenter {
    params: SegmenterParams,
}

impl ContourSegmenter {
    pub fn new(params: SegmenterParams) -> Self {
        Self { params }
    }

    /// Build the contour and extract discontinuities from `scan`.
    ///
    /// Invalid ranges are not filtered: NaN/inf flow into the Cartesian
    /// points as produced by the multiply.
    pub fn segment(&self, scan: &LaserScan) -> Contour {
        let mut contour = Contour {
            full: Vec::with_capacity(scan.len()),
            visible: Vec::with_capacity(scan.len()),
            discontinuities: Vec::new(),
        };
        let mut previous = Point2::origin();

        for (angle, range) in scan.samples() {
            let point = Point2::new(range * angle.cos(), range * angle.sin());
            contour.full.push(point);

            if angle.abs() >= self.params.fov_limit {
                continue;
            }
            contour.visible.push(point);

            if contour.visible.len() > 1 && self.is_discontinuity(previous, point) {
                let pair = DiscontinuityPair::from_neighbours(previous, point);
                trace!(?pair.corner, ?pair.ray, "discontinuity");
                contour.discontinuities.push(pair);
            }
            previous = point;
        }

        contour
    }

    fn is_discontinuity(&self, previous: Point2, current: Point2) -> bool {
        let p = &self.params;
        let dist = previous.distance(current);
        let check = (previous.x - current.x).abs() > p.proximity_threshold
            || (previous.y - current.y).abs() > p.proximity_threshold;
        let under_radius = current.norm().min(previous.norm());
        dist > p.jump_threshold && under_radius <= p.max_detection_radius && check
    }
}
