//! Sensor ingestion onto the bus.
//!
//! [`SensorIngest`] is the single entry point for the driver/transport side:
//! it validates raw scans, grids and transforms and publishes them on their
//! topics.  Malformed payloads are rejected here so the detector only ever
//! sees structurally sound inputs.

use std::sync::Arc;

use umbra_types::{Event, EventPayload, LaserScan, OccupancyGrid, StampedTransform, UmbraError};

use crate::bus::{EventBus, Topic};

/// Maximum number of range readings accepted in a single scan.
pub const MAX_SCAN_RANGES: usize = 4096;

/// Maximum number of cells accepted in a single grid snapshot.
pub const MAX_GRID_CELLS: usize = 4096 * 4096;

const SOURCE: &str = "umbra-middleware::ingest";

/// Validating publisher for inbound sensor data.
#[derive(Debug, Clone)]
pub struct SensorIngest {
    bus: Arc<EventBus>,
}

impl SensorIngest {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Publish one sweep on [`Topic::Scans`].
    pub fn ingest_scan(&self, scan: LaserScan) -> Result<usize, UmbraError> {
        if scan.ranges.len() > MAX_SCAN_RANGES {
            return Err(UmbraError::Serialization(format!(
                "scan has {} range readings, exceeding the limit of {}",
                scan.ranges.len(),
                MAX_SCAN_RANGES,
            )));
        }
        if let Some(angles) = &scan.angles
            && angles.len() != scan.ranges.len()
        {
            return Err(UmbraError::Serialization(format!(
                "scan has {} angles for {} ranges",
                angles.len(),
                scan.ranges.len(),
            )));
        }
        self.bus
            .publish_to(Topic::Scans, Event::new(SOURCE, EventPayload::LaserScan(scan)))
    }

    /// Publish one grid snapshot on [`Topic::Grids`].
    pub fn ingest_grid(&self, grid: OccupancyGrid) -> Result<usize, UmbraError> {
        if !grid.resolution.is_finite() || grid.resolution <= 0.0 {
            return Err(UmbraError::Serialization(format!(
                "grid resolution {} is not a positive length",
                grid.resolution
            )));
        }
        let cells = match grid.cell_count() {
            Some(n) if n <= MAX_GRID_CELLS => n,
            _ => {
                return Err(UmbraError::Serialization(format!(
                    "grid is {}x{}, exceeding the limit of {} cells",
                    grid.width, grid.height, MAX_GRID_CELLS,
                )));
            }
        };
        if grid.data.len() != cells {
            return Err(UmbraError::Serialization(format!(
                "grid is {}x{} but carries {} cells",
                grid.width,
                grid.height,
                grid.data.len(),
            )));
        }
        self.bus
            .publish_to(Topic::Grids, Event::new(SOURCE, EventPayload::OccupancyGrid(grid)))
    }

    /// Publish one frame update on [`Topic::Transforms`].
    pub fn ingest_transform(&self, transform: StampedTransform) -> Result<usize, UmbraError> {
        let [w, x, y, z] = transform.rotation;
        let norm = (w * w + x * x + y * y + z * z).sqrt();
        if !norm.is_finite() || (norm - 1.0).abs() > 1e-3 {
            return Err(UmbraError::Serialization(format!(
                "transform {} -> {} has a non-unit rotation (|q| = {norm})",
                transform.parent_frame, transform.child_frame,
            )));
        }
        self.bus.publish_to(
            Topic::Transforms,
            Event::new(SOURCE, EventPayload::Transform(transform)),
        )
    }
}
