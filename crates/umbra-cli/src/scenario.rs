//! Recorded input for `umbra replay`.
//!
//! A scenario is a JSON document:
//!
//! ```json
//! {
//!   "grid": { "resolution": 0.05, "width": 400, "height": 400,
//!             "origin": { "x": -10.0, "y": -10.0, "yaw": 0.0 }, "data": [0, 0, ...] },
//!   "transforms": [ { "parent_frame": "odom", "child_frame": "base_laser_link",
//!                     "translation": [0.0, 0.0, 0.0], "rotation": [1.0, 0.0, 0.0, 0.0] } ],
//!   "scans": [ { "angle_min": -0.1, "angle_increment": 0.1, "ranges": [1.0, 1.0, 3.0] } ]
//! }
//! ```
//!
//! `grid` and `transforms` may be omitted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use umbra_types::{LaserScan, OccupancyGrid, StampedTransform};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub grid: Option<OccupancyGrid>,
    #[serde(default)]
    pub transforms: Vec<StampedTransform>,
    pub scans: Vec<LaserScan>,
}

pub fn load(path: &Path) -> Result<Scenario, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read scenario at {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("Failed to parse scenario: {}", e))
}
