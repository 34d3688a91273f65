//! Occluded-side ray marching.
//!
//! For one [`DiscontinuityPair`] the [`OcclusionRayMarcher`] walks from the
//! corner toward the ray endpoint in fixed steps.  At every step it places a
//! person-sized footprint on the occluded side of the march line, moves it
//! into the world frame and asks the occupancy grid whether the spot is free.
//! The march ends at the first fully free footprint, or once the marching point
//! has passed the ray endpoint on either axis; both outcomes yield a
//! [`HumanCandidate`].
//!
//! # Failure modes
//!
//! | Error | Meaning |
//! |---|---|
//! | [`DetectError::DegenerateRay`] | corner and ray coincide, or their gap is not finite |
//! | [`DetectError::TransformUnavailable`] | too many consecutive frame lookups failed |
//! | [`DetectError::NoConvergence`] | the iteration cap was reached |
//!
//! Footprints that fall off the grid neither accept nor reject a step; the march
//! simply moves on.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use umbra_types::{DetectError, HumanCandidate, Point2};

use crate::contour::DiscontinuityPair;
use crate::geometry::{ReferenceLine, flanking_points, side_offset};
use crate::occupancy::{CellState, GridOccupancyOracle};
use crate::transform::FrameTransformAdapter;

/// Nominal body radius of a hidden person (metres).
pub const HUMAN_RADIUS: f32 = 0.1;
/// Distance advanced along the corner→ray direction per step (metres).
pub const MARCH_STEP: f32 = 0.1;
/// Added to the world-frame Y of every candidate (sensor mount calibration).
pub const VERTICAL_OFFSET: f32 = 0.055;
/// Replacement for NaN pair coordinates (metres).
pub const NAN_SENTINEL: f32 = 7.0;
/// Hard bound on march steps per discontinuity.
pub const MAX_MARCH_ITERATIONS: usize = 200;
/// Consecutive failed lookups after which a march is abandoned.
pub const MAX_CONSECUTIVE_TRANSFORM_FAILURES: usize = 3;
/// Origin of the side-of-line reference, in the sensor frame.
pub const REFERENCE_ORIGIN: Point2 = Point2 { x: -0.275, y: -0.55 };
pub const REFERENCE_DIRECTION: Point2 = Point2 { x: 1.0, y: 0.0 };

pub const DEFAULT_SENSOR_FRAME: &str = "base_laser_link";
pub const DEFAULT_WORLD_FRAME: &str = "odom";
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 1;

/// Geometric tunables of the march.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchParams {
    pub human_radius: f32,
    pub step: f32,
    pub vertical_offset: f32,
    pub nan_sentinel: f32,
    pub max_iterations: usize,
    pub max_consecutive_transform_failures: usize,
    pub reference: ReferenceLine,
}

impl Default for MarchParams {
    fn default() -> Self {
        Self {
            human_radius: HUMAN_RADIUS,
            step: MARCH_STEP,
            vertical_offset: VERTICAL_OFFSET,
            nan_sentinel: NAN_SENTINEL,
            max_iterations: MAX_MARCH_ITERATIONS,
            max_consecutive_transform_failures: MAX_CONSECUTIVE_TRANSFORM_FAILURES,
            reference: ReferenceLine::new(REFERENCE_ORIGIN, REFERENCE_DIRECTION),
        }
    }
}

/// Frames the footprint points are transformed between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub sensor_frame: String,
    pub world_frame: String,
    /// Maximum wait for each frame lookup.
    pub transform_timeout_ms: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            sensor_frame: DEFAULT_SENSOR_FRAME.to_string(),
            world_frame: DEFAULT_WORLD_FRAME.to_string(),
            transform_timeout_ms: DEFAULT_TRANSFORM_TIMEOUT_MS,
        }
    }
}

impl FrameConfig {
    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }
}

/// Why a march stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All three footprint points read as free space.
    FreeSpace,
    /// The marching point passed the ray endpoint on at least one axis.
    Overshoot,
}

/// A successful march.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchResult {
    pub candidate: HumanCandidate,
    /// Steps taken, including the accepting one.
    pub iterations: usize,
    pub termination: Termination,
}

/// Walks the occluded side of discontinuities.
#[derive(Debug, Clone, Default)]
pub struct OcclusionRayMarcher {
    params: MarchParams,
    frames: FrameConfig,
}

impl OcclusionRayMarcher {
    pub fn new(params: MarchParams, frames: FrameConfig) -> Self {
        Self { params, frames }
    }

    /// Replace NaN coordinates with the sentinel distance, axis by axis.
    pub fn sanitize(&self, pair: DiscontinuityPair) -> DiscontinuityPair {
        let fix = |v: f32| if v.is_nan() { self.params.nan_sentinel } else { v };
        DiscontinuityPair {
            corner: Point2::new(fix(pair.corner.x), fix(pair.corner.y)),
            ray: Point2::new(fix(pair.ray.x), fix(pair.ray.y)),
        }
    }

    /// March along discontinuity `index` and estimate where a person could
    /// stand behind its corner.
    pub fn march(
        &self,
        index: usize,
        pair: &DiscontinuityPair,
        oracle: &GridOccupancyOracle<'_>,
        tf: &dyn FrameTransformAdapter,
    ) -> Result<MarchResult, DetectError> {
        let p = &self.params;
        let pair = self.sanitize(*pair);
        let side = p.reference.side_of(pair.corner);
        let u = pair
            .ray
            .sub(pair.corner)
            .normalized()
            .ok_or(DetectError::DegenerateRay)?;

        let mut t = pair.corner;
        let mut transform_failures = 0usize;

        for iteration in 1..=p.max_iterations {
            let side_point = side_offset(t, u, side, p.human_radius);
            let center = t.midpoint(side_point);
            let (flank_a, flank_b) = flanking_points(t, side_point, p.human_radius);
            let world = self.to_world([flank_a, flank_b, center], tf);

            t = t.add(u.scale(p.step));

            let [world_a, world_b, world_center] = match world {
                Ok(points) => {
                    transform_failures = 0;
                    points
                }
                Err(err) => {
                    transform_failures += 1;
                    debug!(index, iteration, transform_failures, error = %err, "footprint transform failed");
                    if transform_failures >= p.max_consecutive_transform_failures.max(1) {
                        return Err(err);
                    }
                    continue;
                }
            };

            let states = [
                oracle.classify(world_a),
                oracle.classify(world_b),
                oracle.classify(world_center),
            ];
            if states.contains(&CellState::OutOfBounds) {
                trace!(index, iteration, "footprint off the grid");
                continue;
            }

            let termination = if states.iter().all(|s| *s == CellState::Free) {
                Termination::FreeSpace
            } else if t.x.abs() >= pair.ray.x.abs() || t.y.abs() >= pair.ray.y.abs() {
                Termination::Overshoot
            } else {
                continue;
            };

            trace!(index, iteration, ?termination, "march accepted");
            return Ok(MarchResult {
                candidate: HumanCandidate {
                    discontinuity: index,
                    position: Point2::new(world_center.x, world_center.y + p.vertical_offset),
                    sensor_center: center,
                    radius: p.human_radius,
                },
                iterations: iteration,
                termination,
            });
        }

        Err(DetectError::NoConvergence {
            iterations: p.max_iterations,
        })
    }

    fn to_world(
        &self,
        points: [Point2; 3],
        tf: &dyn FrameTransformAdapter,
    ) -> Result<[Point2; 3], DetectError> {
        let timeout = self.frames.transform_timeout();
        let mut out = [Point2::origin(); 3];
        for (slot, point) in out.iter_mut().zip(points) {
            *slot = tf.lookup_and_apply(
                point,
                &self.frames.sensor_frame,
                &self.frames.world_frame,
                timeout,
            )?;
        }
        Ok(out)
    }
}
