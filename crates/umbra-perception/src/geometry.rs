//! Planar helpers shared by the segmenter and the ray marcher.

use serde::{Deserialize, Serialize};
use umbra_types::Point2;

/// Which side of the corner→ray line a hidden person is assumed to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcclusionSide {
    Left,
    Right,
}

impl OcclusionSide {
    /// Unit perpendicular to `direction` pointing into this side.
    pub fn perpendicular(self, direction: Point2) -> Point2 {
        match self {
            OcclusionSide::Left => direction.perp_left(),
            OcclusionSide::Right => direction.perp_right(),
        }
    }
}

/// A directed line used to decide the occluded side of a corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLine {
    pub origin: Point2,
    pub direction: Point2,
}

impl ReferenceLine {
    pub fn new(origin: Point2, direction: Point2) -> Self {
        Self { origin, direction }
    }

    /// Sign test of `point` against the line.
    ///
    /// Points strictly clockwise of the direction are [`OcclusionSide::Right`];
    /// everything else, including points on the line, is
    /// [`OcclusionSide::Left`].
    pub fn side_of(&self, point: Point2) -> OcclusionSide {
        if self.direction.cross(point.sub(self.origin)) < 0.0 {
            OcclusionSide::Right
        } else {
            OcclusionSide::Left
        }
    }
}

/// `anchor` pushed `distance` along the unit perpendicular of `direction`
/// on `side`.
pub fn side_offset(anchor: Point2, direction: Point2, side: OcclusionSide, distance: f32) -> Point2 {
    anchor.add(side.perpendicular(direction).scale(distance))
}

/// Two points `radius` either side of the midpoint of `a`–`b`, along the
/// segment's own direction.
///
/// The march passes `a = t` and `b` its [`side_offset`], so the segment is
/// perpendicular to the march line and the flanks bracket the body across
/// it: one lands `radius / 2` on the visible side of `t`, the other
/// `1.5 * radius` deep into the occluded side.
///
/// Falls back to the midpoint twice when `a == b`.
pub fn flanking_points(a: Point2, b: Point2, radius: f32) -> (Point2, Point2) {
    let center = a.midpoint(b);
    match b.sub(a).normalized() {
        Some(w) => (center.sub(w.scale(radius)), center.add(w.scale(radius))),
        None => (center, center),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceLine {
        ReferenceLine::new(Point2::new(-0.275, -0.55), Point2::new(1.0, 0.0))
    }

    #[test]
    fn points_above_reference_are_left() {
        assert_eq!(reference().side_of(Point2::new(1.0, 0.0)), OcclusionSide::Left);
        assert_eq!(reference().side_of(Point2::new(-3.0, 2.0)), OcclusionSide::Left);
    }

    #[test]
    fn points_below_reference_are_right() {
        assert_eq!(reference().side_of(Point2::new(1.0, -1.0)), OcclusionSide::Right);
    }

    #[test]
    fn points_on_reference_are_left() {
        assert_eq!(reference().side_of(Point2::new(4.0, -0.55)), OcclusionSide::Left);
    }

    #[test]
    fn side_is_invariant_along_reference_direction() {
        let line = reference();
        for &(x, y) in &[(0.3, 1.2), (2.0, -0.9), (-1.0, -0.5), (0.0, -0.6)] {
            let p = Point2::new(x, y);
            let expected = line.side_of(p);
            for k in [-10.0_f32, -2.5, 0.1, 7.0, 42.0] {
                let shifted = p.add(line.direction.scale(k));
                assert_eq!(line.side_of(shifted), expected, "p={p:?} k={k}");
            }
        }
    }

    #[test]
    fn side_offset_moves_perpendicular() {
        let u = Point2::new(1.0, 0.0);
        let left = side_offset(Point2::origin(), u, OcclusionSide::Left, 0.1);
        let right = side_offset(Point2::origin(), u, OcclusionSide::Right, 0.1);
        assert!((left.y - 0.1).abs() < 1e-6 && left.x.abs() < 1e-6);
        assert!((right.y + 0.1).abs() < 1e-6 && right.x.abs() < 1e-6);
    }

    #[test]
    fn flanking_points_straddle_midpoint() {
        let (l, r) = flanking_points(Point2::new(0.0, 0.0), Point2::new(0.0, 0.1), 0.1);
        assert!((l.y + 0.05).abs() < 1e-6);
        assert!((r.y - 0.15).abs() < 1e-6);
        assert!(l.x.abs() < 1e-6 && r.x.abs() < 1e-6);
    }

    #[test]
    fn flanks_of_a_side_offset_cross_the_march_line() {
        let t = Point2::new(2.0, 1.0);
        let u = Point2::new(1.0, 0.0);
        let side_point = side_offset(t, u, OcclusionSide::Left, 0.1);
        let (near, far) = flanking_points(t, side_point, 0.1);

        // Both flanks share t's position along the march direction.
        assert!(near.sub(t).dot(u).abs() < 1e-6);
        assert!(far.sub(t).dot(u).abs() < 1e-6);
        assert!((near.y - 0.95).abs() < 1e-6);
        assert!((far.y - 1.15).abs() < 1e-6);
    }

    #[test]
    fn flanking_points_degenerate_segment() {
        let p = Point2::new(1.0, 2.0);
        assert_eq!(flanking_points(p, p, 0.1), (p, p));
    }
}
