//! `umbra-runtime` – detection orchestration.
//!
//! Wires the perception pipeline to the message bus and keeps passes
//! single-flight.
//!
//! # Modules
//!
//! - [`gate`] – [`LocatingGate`][gate::LocatingGate] and its RAII
//!   [`PassToken`][gate::PassToken]: at most one pass in flight, later scans
//!   are dropped.
//! - [`aggregator`] – [`DetectionAggregator`][aggregator::DetectionAggregator]:
//!   candidates → detections plus cylinder markers, handed to a
//!   [`DetectionPublisher`][umbra_middleware::DetectionPublisher].
//! - [`detector`] – [`OcclusionDetector`][detector::OcclusionDetector]: one
//!   segment → march → emit pass.
//! - [`node`] – [`DetectorNode`][node::DetectorNode]: the async service that
//!   feeds the detector from the bus.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod aggregator;
pub mod detector;
pub mod gate;
pub mod node;
pub mod telemetry;

pub use aggregator::{DetectionAggregator, OutputConfig};
pub use detector::{DetectionPass, DetectorConfig, OcclusionDetector, PassOutcome};
pub use gate::{LocatingGate, PassToken};
pub use node::{DetectorNode, NodeStats};
pub use telemetry::{TracerProviderGuard, init_tracing};
