//! [`DetectorNode`] – bus-driven detection service.
//!
//! Subscribes to scans, grids and transforms on the [`EventBus`] and runs an
//! [`OcclusionDetector`] pass for every scan that arrives while no other pass
//! is in flight.  Scans that arrive during a pass are dropped, not queued.
//!
//! Grid and transform updates are handled before scans whenever several
//! events are ready at once, so a scan always sees the freshest snapshot.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::{Arc, atomic::AtomicBool};
//! use umbra_middleware::{BusPublisher, EventBus};
//! use umbra_runtime::{DetectorConfig, DetectorNode, OcclusionDetector};
//!
//! # async fn run() {
//! let bus = Arc::new(EventBus::default());
//! let publisher = Arc::new(BusPublisher::new(Arc::clone(&bus)));
//! let detector = Arc::new(OcclusionDetector::new(DetectorConfig::default(), publisher));
//! let node = DetectorNode::new(&bus, detector);
//! let stats = node.run(Arc::new(AtomicBool::new(false))).await;
//! println!("{} passes", stats.passes_completed);
//! # }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use umbra_middleware::{EventBus, Topic, TopicReceiver};
use umbra_perception::TfBuffer;
use umbra_types::{Event, EventPayload, LaserScan, OccupancyGrid};

use crate::detector::{OcclusionDetector, PassOutcome};

/// How often the shutdown flag is checked while the bus is quiet.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Counters reported when the node stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub scans_received: u64,
    pub scans_dropped: u64,
    pub passes_completed: u64,
    pub passes_skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    scans_received: AtomicU64,
    scans_dropped: AtomicU64,
    passes_completed: AtomicU64,
    passes_skipped: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &PassOutcome) {
        let counter = match outcome {
            PassOutcome::Completed(_) => &self.passes_completed,
            PassOutcome::Skipped(_) => &self.passes_skipped,
            PassOutcome::Dropped => &self.scans_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> NodeStats {
        NodeStats {
            scans_received: self.scans_received.load(Ordering::Relaxed),
            scans_dropped: self.scans_dropped.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_skipped: self.passes_skipped.load(Ordering::Relaxed),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DetectorNode
// ─────────────────────────────────────────────────────────────────────────────

pub struct DetectorNode {
    detector: Arc<OcclusionDetector>,
    tf: TfBuffer,
    grid: Option<Arc<OccupancyGrid>>,
    scans: TopicReceiver,
    grids: TopicReceiver,
    transforms: TopicReceiver,
    in_flight: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl DetectorNode {
    /// Subscribe immediately so no event published after this call is lost.
    pub fn new(bus: &EventBus, detector: Arc<OcclusionDetector>) -> Self {
        Self {
            detector,
            tf: TfBuffer::new(),
            grid: None,
            scans: bus.subscribe_to(Topic::Scans),
            grids: bus.subscribe_to(Topic::Grids),
            transforms: bus.subscribe_to(Topic::Transforms),
            in_flight: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Run until `shutdown` is set or the scan topic closes, then wait for
    /// the in-flight pass and report counters.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) -> NodeStats {
        info!("detector node started");
        let mut ticker = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);

        let mut grids_open = true;
        let mut transforms_open = true;

        while !shutdown.load(Ordering::Relaxed) {
            tokio::select! {
                biased;

                event = self.grids.recv(), if grids_open => {
                    grids_open = self.handle(Topic::Grids, event);
                }
                event = self.transforms.recv(), if transforms_open => {
                    transforms_open = self.handle(Topic::Transforms, event);
                }
                event = self.scans.recv() => {
                    if !self.handle(Topic::Scans, event) {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }
        }

        if let Some(handle) = self.in_flight.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "detection pass did not finish cleanly");
        }
        let stats = self.counters.snapshot();
        info!(?stats, "detector node stopped");
        stats
    }

    /// Returns `false` once the topic is closed.
    fn handle(&mut self, topic: Topic, event: Result<Event, RecvError>) -> bool {
        match event {
            Ok(event) => {
                self.dispatch(event);
                true
            }
            Err(RecvError::Lagged(n)) => {
                warn!(?topic, skipped = n, "detector node lagging");
                true
            }
            Err(RecvError::Closed) => {
                debug!(?topic, "bus closed");
                false
            }
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event.payload {
            EventPayload::OccupancyGrid(grid) => {
                debug!(width = grid.width, height = grid.height, "grid updated");
                self.grid = Some(Arc::new(grid));
            }
            EventPayload::Transform(t) => self.tf.set_stamped(&t),
            EventPayload::LaserScan(scan) => self.on_scan(scan),
            _ => debug!(source = %event.source, "ignoring unexpected payload"),
        }
    }

    fn on_scan(&mut self, scan: LaserScan) {
        self.counters.scans_received.fetch_add(1, Ordering::Relaxed);

        let Some(token) = self.detector.gate().try_begin() else {
            debug!("pass in flight; scan dropped");
            self.counters.scans_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let detector = Arc::clone(&self.detector);
        let counters = Arc::clone(&self.counters);
        let grid = self.grid.clone();
        let tf = self.tf.clone();
        self.in_flight = Some(tokio::task::spawn_blocking(move || {
            let outcome = detector.run_pass(&token, &scan, grid.as_deref(), &tf);
            counters.record(&outcome);
        }));
    }
}
