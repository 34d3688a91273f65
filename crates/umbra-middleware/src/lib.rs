//! `umbra-middleware` – message plumbing.
//!
//! Routes sensor inputs to the detector and detector outputs to whoever is
//! listening, without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`ingest`] – validating entry point that puts scans, grids and
//!   transforms on the bus.
//! - [`publisher`] – the [`DetectionPublisher`] seam and its bus-backed
//!   implementation.

pub mod bus;
pub mod ingest;
pub mod publisher;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use ingest::SensorIngest;
pub use publisher::{BusPublisher, DetectionPublisher};
