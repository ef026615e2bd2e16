//! Conversion of SDK spans and metric snapshots into OTLP protobuf messages.

/// Attributes, resources and scopes.
pub mod common;

/// Metric snapshots.
pub mod metrics;

/// Finished spans.
pub mod trace;
