//! Output side of a detection pass.
//!
//! The detector never talks to a transport directly; it hands its results
//! to a [`DetectionPublisher`].  [`BusPublisher`] forwards them onto the
//! [`EventBus`] so any number of consumers (planners, visualisers, loggers)
//! can pick them up.

use std::sync::Arc;

use tracing::debug;
use umbra_types::{CylinderMarker, Event, EventPayload, HumanDetections, UmbraError};

use crate::bus::{EventBus, Topic};

/// Event source tag used by [`BusPublisher`].
pub const DETECTOR_SOURCE: &str = "umbra-runtime::detector";

/// Every publishing backend must implement this trait.
///
/// Both methods are called once per completed pass, detections first.
pub trait DetectionPublisher: Send + Sync {
    fn publish_detections(&self, detections: &HumanDetections) -> Result<(), UmbraError>;

    fn publish_markers(&self, markers: &[CylinderMarker]) -> Result<(), UmbraError>;
}

/// Publishes onto [`Topic::Detections`] and [`Topic::Markers`].
///
/// A topic without subscribers is not an error here: results are simply
/// not observed by anyone.
#[derive(Debug, Clone)]
pub struct BusPublisher {
    bus: Arc<EventBus>,
}

impl BusPublisher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    fn send(&self, topic: Topic, payload: EventPayload) -> Result<(), UmbraError> {
        if self.bus.subscriber_count(topic) == 0 {
            debug!(?topic, "no subscribers; result not published");
            return Ok(());
        }
        self.bus
            .publish_to(topic, Event::new(DETECTOR_SOURCE, payload))
            .map(|_| ())
    }
}

impl DetectionPublisher for BusPublisher {
    fn publish_detections(&self, detections: &HumanDetections) -> Result<(), UmbraError> {
        self.send(Topic::Detections, EventPayload::Detections(detections.clone()))
    }

    fn publish_markers(&self, markers: &[CylinderMarker]) -> Result<(), UmbraError> {
        self.send(Topic::Markers, EventPayload::Markers(markers.to_vec()))
    }
}
