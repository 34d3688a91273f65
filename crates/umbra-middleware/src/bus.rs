//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Scans`] | Range sweeps from the sensor driver |
//! | [`Topic::Grids`] | Local occupancy grid snapshots |
//! | [`Topic::Transforms`] | Frame transform updates |
//! | [`Topic::Detections`] | Estimated occluded-human positions |
//! | [`Topic::Markers`] | Cylinder markers for visualisation |

use tokio::sync::broadcast;
use umbra_types::{Event, UmbraError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Scans,
    Grids,
    Transforms,
    Detections,
    Markers,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    scans: broadcast::Sender<Event>,
    grids: broadcast::Sender<Event>,
    transforms: broadcast::Sender<Event>,
    detections: broadcast::Sender<Event>,
    markers: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (scans, _) = broadcast::channel(capacity);
        let (grids, _) = broadcast::channel(capacity);
        let (transforms, _) = broadcast::channel(capacity);
        let (detections, _) = broadcast::channel(capacity);
        let (markers, _) = broadcast::channel(capacity);
        Self {
            scans,
            grids,
            transforms,
            detections,
            markers,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`UmbraError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, UmbraError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| UmbraError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Scans => &self.scans,
            Topic::Grids => &self.grids,
            Topic::Transforms => &self.transforms,
            Topic::Detections => &self.detections,
            Topic::Markers => &self.markers,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   messages were dropped.
    /// * `Err(RecvError::Closed)` – every sender has been dropped.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_types::{EventPayload, HumanDetections, LaserScan};

    fn scan_event() -> Event {
        Event::new(
            "umbra-middleware::test",
            EventPayload::LaserScan(LaserScan::new(0.0, 0.1, vec![1.0, 2.0])),
        )
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Scans, scan_event());
        assert!(matches!(result, Err(UmbraError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Scans);
        let mut subscriber2 = bus.subscribe_to(Topic::Scans);

        let event = scan_event();
        assert_eq!(bus.publish_to(Topic::Scans, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    /// A subscriber on `Detections` must not see `Scans` traffic.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut detections = bus.subscribe_to(Topic::Detections);
        let _scans = bus.subscribe_to(Topic::Scans);

        bus.publish_to(Topic::Scans, scan_event())?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            detections.recv(),
        )
        .await;
        assert!(result.is_err(), "Detections subscriber must not receive a scan");
        Ok(())
    }

    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::Detections);

        for _ in 0..1_000 {
            let _ = bus.publish_to(
                Topic::Detections,
                Event::new("flood", EventPayload::Detections(HumanDetections::default())),
            );
        }

        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::Grids), 0);
        let rx = bus.subscribe_to(Topic::Grids);
        assert_eq!(rx.topic(), Topic::Grids);
        assert_eq!(bus.subscriber_count(Topic::Grids), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Grids), 0);
    }
}
