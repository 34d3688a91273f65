//! Drives a recorded [`Scenario`] through a live [`DetectorNode`].
//!
//! Inputs go on one bus, results come back on another.  Once every scan has
//! been fed the input bus is dropped, which lets the node drain its queue,
//! finish the last pass and stop on its own.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use umbra_middleware::{BusPublisher, EventBus, SensorIngest, Topic};
use umbra_runtime::{DetectorNode, NodeStats, OcclusionDetector};
use umbra_types::{EventPayload, HumanDetections};

use crate::config::Config;
use crate::scenario::Scenario;

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub stats: NodeStats,
    /// Every published detection set, in publish order.
    pub detections: Vec<HumanDetections>,
    /// `true` when the replay was cut short by `shutdown`.
    pub interrupted: bool,
}

pub async fn run(
    scenario: Scenario,
    cfg: &Config,
    shutdown: Arc<AtomicBool>,
) -> Result<ReplayReport, String> {
    let input = Arc::new(EventBus::new(cfg.bus_capacity));
    let output = Arc::new(EventBus::new(cfg.bus_capacity));

    let publisher = Arc::new(BusPublisher::new(Arc::clone(&output)));
    let detector = Arc::new(OcclusionDetector::new(cfg.detector.clone(), publisher));
    let node = DetectorNode::new(&input, detector);

    let mut results = output.subscribe_to(Topic::Detections);
    drop(output);
    let collector = tokio::spawn(async move {
        let mut collected = Vec::new();
        loop {
            match results.recv().await {
                Ok(event) => {
                    if let EventPayload::Detections(d) = event.payload {
                        collected.push(d);
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "replay output lagging"),
                Err(RecvError::Closed) => break,
            }
        }
        collected
    });

    let node_task = tokio::spawn(node.run(Arc::clone(&shutdown)));

    let ingest = SensorIngest::new(Arc::clone(&input));
    if let Some(grid) = scenario.grid {
        ingest.ingest_grid(grid).map_err(|e| e.to_string())?;
    }
    for transform in scenario.transforms {
        ingest.ingest_transform(transform).map_err(|e| e.to_string())?;
    }

    let period = Duration::from_millis(cfg.scan_period_ms);
    let total = scenario.scans.len();
    let mut interrupted = false;
    for (i, scan) in scenario.scans.into_iter().enumerate() {
        if shutdown.load(Ordering::SeqCst) {
            interrupted = true;
            break;
        }
        if let Err(e) = ingest.ingest_scan(scan) {
            warn!(scan = i, error = %e, "scan rejected");
        }
        if i + 1 < total {
            tokio::time::sleep(period).await;
        }
    }
    drop(ingest);
    drop(input);

    let stats = node_task.await.map_err(|e| format!("Detector node failed: {}", e))?;
    let detections = collector
        .await
        .map_err(|e| format!("Result collector failed: {}", e))?;
    info!(?stats, published = detections.len(), "replay finished");

    Ok(ReplayReport {
        stats,
        detections,
        interrupted,
    })
}
