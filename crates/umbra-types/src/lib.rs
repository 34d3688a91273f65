//! `umbra-types` – shared data model for the occluded-human pipeline.
//!
//! Everything that crosses a crate boundary lives here: the raw sensor inputs
//! ([`LaserScan`], [`OccupancyGrid`], [`StampedTransform`]), the planar
//! geometry primitive [`Point2`], the pipeline outputs ([`HumanCandidate`],
//! [`HumanDetections`], [`CylinderMarker`]), the bus envelope [`Event`] and
//! the error enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Point2
// ────────────────────────────────────────────────────────────────────────────

/// A point (or free vector) in a planar frame, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The frame origin.
    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Z component of the 3-D cross product `self × rhs`.
    ///
    /// Positive when `rhs` lies counter-clockwise of `self`.
    pub fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    /// Euclidean length (distance from the origin).
    pub fn norm(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f32 {
        self.sub(other).norm()
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    /// Unit vector in the same direction, or `None` when the length is zero
    /// or not finite.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if n > 0.0 && n.is_finite() {
            Some(self.scale(1.0 / n))
        } else {
            None
        }
    }

    /// Rotate by +90° (counter-clockwise).
    pub fn perp_left(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotate by -90° (clockwise).
    pub fn perp_right(self) -> Self {
        Self::new(self.y, -self.x)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LaserScan
// ────────────────────────────────────────────────────────────────────────────

/// One planar range-sensor sweep, expressed in the sensor frame.
///
/// Ranges are metres; `NaN`, `inf` and out-of-range values are carried
/// through untouched and handled by the consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    /// Bearing of the first reading (radians).
    pub angle_min: f32,
    /// Angular step between consecutive readings (radians).
    pub angle_increment: f32,
    pub ranges: Vec<f32>,
    /// Optional per-reading bearings for non-uniform sweeps. When present
    /// they take precedence over `angle_min` / `angle_increment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angles: Option<Vec<f32>>,
}

impl LaserScan {
    /// Create a uniformly spaced scan.
    pub fn new(angle_min: f32, angle_increment: f32, ranges: Vec<f32>) -> Self {
        Self {
            angle_min,
            angle_increment,
            ranges,
            angles: None,
        }
    }

    /// Create a scan from explicit `(angle, range)` pairs.
    pub fn from_samples(samples: &[(f32, f32)]) -> Self {
        let (angles, ranges): (Vec<f32>, Vec<f32>) = samples.iter().copied().unzip();
        Self {
            angle_min: angles.first().copied().unwrap_or(0.0),
            angle_increment: 0.0,
            ranges,
            angles: Some(angles),
        }
    }

    /// Number of readings in the sweep.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Bearing of reading `i`.
    pub fn angle_at(&self, i: usize) -> f32 {
        match &self.angles {
            Some(angles) if i < angles.len() => angles[i],
            _ => self.angle_min + i as f32 * self.angle_increment,
        }
    }

    /// Iterate over the sweep as ordered `(angle, range)` pairs.
    pub fn samples(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.ranges
            .iter()
            .enumerate()
            .map(|(i, &range)| (self.angle_at(i), range))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OccupancyGrid
// ────────────────────────────────────────────────────────────────────────────

/// Cell value meaning "definitely free".
pub const FREE_CELL: i8 = 0;
/// Cell value meaning "never observed".
pub const UNKNOWN_CELL: i8 = -1;
/// Cell value for a lethal obstacle.
pub const LETHAL_CELL: i8 = 100;

/// Pose of cell (0, 0)'s outer corner in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridOrigin {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub yaw: f32,
}

/// A local occupancy grid snapshot.
///
/// `data` is row-major: cell `(col, row)` lives at `row * width + col`.
/// Values follow the costmap convention: `0` free, `1..=100` occupied cost,
/// `-1` unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Cell edge length in metres.
    pub resolution: f32,
    pub width: usize,
    pub height: usize,
    pub origin: GridOrigin,
    pub data: Vec<i8>,
}

impl OccupancyGrid {
    /// Create a grid where every cell holds `value`.
    pub fn filled(
        width: usize,
        height: usize,
        resolution: f32,
        origin: GridOrigin,
        value: i8,
    ) -> Self {
        Self {
            resolution,
            width,
            height,
            origin,
            data: vec![value; width * height],
        }
    }

    /// Number of cells the metadata describes, or `None` when
    /// `width * height` does not fit in `usize`.
    pub fn cell_count(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StampedTransform
// ────────────────────────────────────────────────────────────────────────────

/// A rigid transform between two named frames as it arrives from the
/// transform stream: the pose of `child_frame` expressed in `parent_frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub parent_frame: String,
    pub child_frame: String,
    /// `[x, y, z]` in metres.
    pub translation: [f32; 3],
    /// Unit quaternion `[w, x, y, z]`.
    pub rotation: [f32; 4],
}

impl StampedTransform {
    /// Planar convenience constructor: translation `(x, y)` and heading `yaw`.
    pub fn planar(parent_frame: &str, child_frame: &str, x: f32, y: f32, yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self {
            parent_frame: parent_frame.to_string(),
            child_frame: child_frame.to_string(),
            translation: [x, y, 0.0],
            rotation: [half.cos(), 0.0, 0.0, half.sin()],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

/// An estimated hidden person, created once per discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumanCandidate {
    /// Index of the discontinuity that produced this candidate.
    pub discontinuity: usize,
    /// World-frame center, vertical offset already applied.
    pub position: Point2,
    /// Center in the sensor frame before transformation.
    pub sensor_center: Point2,
    /// Nominal body radius used while marching.
    pub radius: f32,
}

/// Ordered list of candidate positions for one pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HumanDetections {
    pub frame_id: String,
    pub points: Vec<Point2>,
}

/// A cylinder visualisation marker, one per candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylinderMarker {
    pub id: i32,
    pub frame_id: String,
    /// `[x, y, z]` of the cylinder center.
    pub position: [f32; 3],
    /// `[diameter_x, diameter_y, height]`.
    pub scale: [f32; 3],
    /// `[r, g, b, a]` in `0.0..=1.0`.
    pub color: [f32; 4],
    pub lifetime_ms: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Event envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the internal bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"umbra-runtime::detector"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(source: &str, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.to_string(),
            payload,
        }
    }
}

/// Variants of data routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    LaserScan(LaserScan),
    OccupancyGrid(OccupancyGrid),
    Transform(StampedTransform),
    Detections(HumanDetections),
    Markers(Vec<CylinderMarker>),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failure of one discontinuity march or of a whole detection pass.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetectError {
    #[error("Degenerate ray: corner and ray endpoint coincide or are not finite")]
    DegenerateRay,

    #[error("Transform unavailable from '{source_frame}' to '{target_frame}'")]
    TransformUnavailable {
        source_frame: String,
        target_frame: String,
    },

    #[error("March did not converge within {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("No occupancy grid received yet")]
    GridUnavailable,
}

/// Infrastructure error type spanning detection, messaging and configuration.
#[derive(Error, Debug)]
pub enum UmbraError {
    #[error("Detection failed: {0}")]
    Detection(#[from] DetectError),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_perpendiculars_are_orthogonal() {
        let u = Point2::new(0.6, 0.8);
        assert!(u.dot(u.perp_left()).abs() < 1e-6);
        assert!(u.dot(u.perp_right()).abs() < 1e-6);
        assert!(u.cross(u.perp_left()) > 0.0);
        assert!(u.cross(u.perp_right()) < 0.0);
    }

    #[test]
    fn normalized_rejects_zero_and_non_finite() {
        assert!(Point2::origin().normalized().is_none());
        assert!(Point2::new(f32::INFINITY, 0.0).normalized().is_none());
        assert!(Point2::new(f32::NAN, 1.0).normalized().is_none());
        let u = Point2::new(3.0, 4.0).normalized().unwrap();
        assert!((u.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_scan_angles() {
        let scan = LaserScan::new(-0.1, 0.05, vec![1.0, 2.0, 3.0]);
        let samples: Vec<_> = scan.samples().collect();
        assert_eq!(samples.len(), 3);
        assert!((samples[0].0 + 0.1).abs() < 1e-6);
        assert!((samples[2].0 - 0.0).abs() < 1e-6);
        assert_eq!(samples[1].1, 2.0);
    }

    #[test]
    fn explicit_angles_take_precedence() {
        let scan = LaserScan::from_samples(&[(-0.1, 1.0), (0.0, 1.0), (0.3, 2.0)]);
        assert!((scan.angle_at(2) - 0.3).abs() < 1e-6);
        assert_eq!(scan.len(), 3);
    }

    #[test]
    fn filled_grid_has_all_cells() {
        let g = OccupancyGrid::filled(4, 3, 0.5, GridOrigin::default(), FREE_CELL);
        assert_eq!(g.data.len(), 12);
        assert_eq!(g.cell_count(), Some(12));
    }

    #[test]
    fn oversized_dimensions_have_no_cell_count() {
        let g = OccupancyGrid {
            resolution: 0.05,
            width: usize::MAX / 2 + 1,
            height: 4,
            origin: GridOrigin::default(),
            data: vec![FREE_CELL; 4],
        };
        assert_eq!(g.cell_count(), None);
    }

    #[test]
    fn planar_transform_encodes_yaw() {
        let t = StampedTransform::planar("odom", "base_laser_link", 1.0, 2.0, std::f32::consts::PI);
        assert!(t.rotation[0].abs() < 1e-6);
        assert!((t.rotation[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "umbra-runtime::detector",
            EventPayload::Detections(HumanDetections {
                frame_id: "map".to_string(),
                points: vec![Point2::new(1.0, 2.0)],
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        match back.payload {
            EventPayload::Detections(d) => assert_eq!(d.points[0], Point2::new(1.0, 2.0)),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn detect_error_display() {
        let err = DetectError::TransformUnavailable {
            source_frame: "base_laser_link".to_string(),
            target_frame: "odom".to_string(),
        };
        assert!(err.to_string().contains("base_laser_link"));
        let wrapped: UmbraError = DetectError::NoConvergence { iterations: 200 }.into();
        assert!(wrapped.to_string().contains("200"));
    }
}
