//! Collects the candidates of one pass into published outputs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use umbra_middleware::DetectionPublisher;
use umbra_types::{CylinderMarker, HumanCandidate, HumanDetections};

pub const DEFAULT_OUTPUT_FRAME: &str = "map";
pub const MARKER_DIAMETER: f32 = 0.6;
pub const MARKER_HEIGHT: f32 = 1.2;
pub const MARKER_LIFETIME_MS: u64 = 100;
pub const MARKER_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// How results are labelled and drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Frame id stamped on detections and markers.
    pub output_frame: String,
    pub marker_diameter: f32,
    pub marker_height: f32,
    pub marker_lifetime_ms: u64,
    /// `[r, g, b, a]`
    pub marker_color: [f32; 4],
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_frame: DEFAULT_OUTPUT_FRAME.to_string(),
            marker_diameter: MARKER_DIAMETER,
            marker_height: MARKER_HEIGHT,
            marker_lifetime_ms: MARKER_LIFETIME_MS,
            marker_color: MARKER_COLOR,
        }
    }
}

/// Turns candidates into [`HumanDetections`] and one [`CylinderMarker`] each.
pub struct DetectionAggregator {
    output: OutputConfig,
    publisher: Arc<dyn DetectionPublisher>,
}

impl DetectionAggregator {
    pub fn new(output: OutputConfig, publisher: Arc<dyn DetectionPublisher>) -> Self {
        Self { output, publisher }
    }

    /// Build both outputs, preserving candidate order.  Marker ids are the
    /// discontinuity indices so a visualiser can replace stale cylinders.
    pub fn build(&self, candidates: &[HumanCandidate]) -> (HumanDetections, Vec<CylinderMarker>) {
        let o = &self.output;
        let detections = HumanDetections {
            frame_id: o.output_frame.clone(),
            points: candidates.iter().map(|c| c.position).collect(),
        };
        let markers = candidates
            .iter()
            .map(|c| CylinderMarker {
                id: i32::try_from(c.discontinuity).unwrap_or(i32::MAX),
                frame_id: o.output_frame.clone(),
                position: [c.position.x, c.position.y, o.marker_height / 2.0],
                scale: [o.marker_diameter, o.marker_diameter, o.marker_height],
                color: o.marker_color,
                lifetime_ms: o.marker_lifetime_ms,
            })
            .collect();
        (detections, markers)
    }

    /// Build and publish.  Publish failures are logged, never propagated.
    pub fn emit(&self, candidates: &[HumanCandidate]) -> HumanDetections {
        let (detections, markers) = self.build(candidates);
        if let Err(e) = self.publisher.publish_detections(&detections) {
            warn!(error = %e, "failed to publish detections");
        }
        if let Err(e) = self.publisher.publish_markers(&markers) {
            warn!(error = %e, "failed to publish markers");
        }
        detections
    }
}
