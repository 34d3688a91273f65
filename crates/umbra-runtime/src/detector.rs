//! [`OcclusionDetector`] – one synchronous detection pass.
//!
//! A pass takes the latest scan and grid snapshot and runs:
//!
//! 1. **Segment** – [`ContourSegmenter`] turns the sweep into a contour and
//!    its corner/ray discontinuities.
//! 2. **March** – every discontinuity is handed to the
//!    [`OcclusionRayMarcher`]; failures are local to that discontinuity.
//! 3. **Emit** – the [`DetectionAggregator`] publishes the surviving
//!    candidates, even when there are none.
//!
//! Passes are single-flight: [`OcclusionDetector::process_scan`] drops the
//! scan outright when the [`LocatingGate`] is already held.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use umbra_middleware::DetectionPublisher;
use umbra_perception::{
    Contour, ContourSegmenter, FrameConfig, FrameTransformAdapter, GridOccupancyOracle,
    MarchParams, OcclusionRayMarcher, SegmenterParams,
};
use umbra_types::{DetectError, HumanCandidate, HumanDetections, LaserScan, OccupancyGrid};

use crate::aggregator::{DetectionAggregator, OutputConfig};
use crate::gate::{LocatingGate, PassToken};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Every tunable of a pass.  Missing TOML keys fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub segmenter: SegmenterParams,
    pub march: MarchParams,
    pub frames: FrameConfig,
    pub output: OutputConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one completed pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionPass {
    pub contour: Contour,
    /// In discontinuity discovery order.
    pub candidates: Vec<HumanCandidate>,
    /// `(discontinuity index, reason)` for every pair that produced nothing.
    pub failures: Vec<(usize, DetectError)>,
    /// What was handed to the publisher.
    pub detections: HumanDetections,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Another pass was in flight; the scan was discarded.
    Dropped,
    /// The pass could not start; nothing was published.
    Skipped(DetectError),
    Completed(DetectionPass),
}

// ─────────────────────────────────────────────────────────────────────────────
// OcclusionDetector
// ─────────────────────────────────────────────────────────────────────────────

pub struct OcclusionDetector {
    gate: LocatingGate,
    segmenter: ContourSegmenter,
    marcher: OcclusionRayMarcher,
    aggregator: DetectionAggregator,
}

impl OcclusionDetector {
    pub fn new(config: DetectorConfig, publisher: Arc<dyn DetectionPublisher>) -> Self {
        Self {
            gate: LocatingGate::new(),
            segmenter: ContourSegmenter::new(config.segmenter),
            marcher: OcclusionRayMarcher::new(config.march, config.frames),
            aggregator: DetectionAggregator::new(config.output, publisher),
        }
    }

    pub fn gate(&self) -> &LocatingGate {
        &self.gate
    }

    /// Claim the gate and run one pass, or drop the scan if a pass is
    /// already in flight.
    pub fn process_scan(
        &self,
        scan: &LaserScan,
        grid: Option<&OccupancyGrid>,
        tf: &dyn FrameTransformAdapter,
    ) -> PassOutcome {
        match self.gate.try_begin() {
            Some(token) => self.run_pass(&token, scan, grid, tf),
            None => {
                debug!("pass in flight; scan dropped");
                PassOutcome::Dropped
            }
        }
    }

    /// Run one pass under an already claimed `token`.
    #[instrument(skip_all, fields(ranges = scan.len()))]
    pub fn run_pass(
        &self,
        _token: &PassToken,
        scan: &LaserScan,
        grid: Option<&OccupancyGrid>,
        tf: &dyn FrameTransformAdapter,
    ) -> PassOutcome {
        let Some(grid) = grid else {
            debug!("no occupancy grid yet; pass skipped");
            return PassOutcome::Skipped(DetectError::GridUnavailable);
        };
        let oracle = GridOccupancyOracle::new(grid);
        let contour = self.segmenter.segment(scan);

        let mut candidates = Vec::with_capacity(contour.discontinuities.len());
        let mut failures = Vec::new();
        for (index, pair) in contour.discontinuities.iter().enumerate() {
            match self.marcher.march(index, pair, &oracle, tf) {
                Ok(result) => {
                    debug!(
                        index,
                        iterations = result.iterations,
                        termination = ?result.termination,
                        "candidate found"
                    );
                    candidates.push(result.candidate);
                }
                Err(e) => {
                    warn!(index, error = %e, "discontinuity skipped");
                    failures.push((index, e));
                }
            }
        }

        let detections = self.aggregator.emit(&candidates);
        info!(
            discontinuities = contour.discontinuities.len(),
            candidates = candidates.len(),
            failures = failures.len(),
            "pass complete"
        );

        PassOutcome::Completed(DetectionPass {
            contour,
            candidates,
            failures,
            detections,
        })
    }
}
