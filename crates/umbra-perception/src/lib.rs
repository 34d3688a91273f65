//! `umbra-perception` – occlusion-inference geometry.
//!
//! Turns one range sweep plus one occupancy snapshot into estimated positions
//! of people standing just out of the sensor's view.
//!
//! # Modules
//!
//! - [`contour`] – [`ContourSegmenter`][contour::ContourSegmenter]: polar →
//!   Cartesian conversion and corner/ray discontinuity extraction.
//! - [`occupancy`] – [`GridOccupancyOracle`][occupancy::GridOccupancyOracle]:
//!   world point → free / occupied / off-grid.
//! - [`ray_march`] – [`OcclusionRayMarcher`][ray_march::OcclusionRayMarcher]:
//!   walks the occluded side of a discontinuity until a person-sized free
//!   spot is found.
//! - [`geometry`] – side-of-line test and footprint placement helpers.
//! - [`transform`] – [`TfEngine`][transform::TfEngine] frame graph and the
//!   [`FrameTransformAdapter`][transform::FrameTransformAdapter] capability.

pub mod contour;
pub mod geometry;
pub mod occupancy;
pub mod ray_march;
pub mod transform;

pub use contour::{Contour, ContourSegmenter, DiscontinuityPair, SegmenterParams};
pub use geometry::{OcclusionSide, ReferenceLine};
pub use occupancy::{CellState, GridOccupancyOracle};
pub use ray_march::{FrameConfig, MarchParams, MarchResult, OcclusionRayMarcher, Termination};
pub use transform::{FrameTransformAdapter, TfBuffer, TfEngine, Transform3D};
