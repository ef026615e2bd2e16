use crate::common::KeyValue;
use crate::resource::{Resource, ResourceDetector};

/// Detects the telemetry SDK information.
///
/// It provides `telemetry.sdk.name` (`beacon`), `telemetry.sdk.language`
/// (`rust`) and `telemetry.sdk.version` (the `beacon_sdk` crate version).
#[derive(Debug)]
pub struct TelemetryResourceDetector;

impl ResourceDetector for TelemetryResourceDetector {
    fn detect(&self) -> Resource {
        Resource::from_lenient_pairs([
            KeyValue::new("telemetry.sdk.name", "beacon"),
            KeyValue::new("telemetry.sdk.language", "rust"),
            KeyValue::new("telemetry.sdk.version", env!("CARGO_PKG_VERSION")),
        ])
    }
}
