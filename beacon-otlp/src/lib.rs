//! # Beacon OTLP exporters
//!
//! Sends the spans and metrics produced by [`beacon_sdk`] to an OpenTelemetry
//! Collector over gRPC, using [`tonic`] as the transport and the
//! [`opentelemetry_proto`] message definitions.
//!
//! Both exporters share one lazily connected channel. The channel captures the
//! tokio runtime it was built on and every request is driven there, so the
//! SDK's background threads can call the exporters without a runtime of their
//! own.
//!
//! ## Quickstart
//!
//! [`install`] wires everything a service needs in one call: a
//! [`TracerProvider`] with a batch span processor, a [`MeterProvider`] with a
//! periodic reader, the process memory sampler and the composite
//! `traceparent` + `baggage` propagator.
//!
//! ```no_run
//! use beacon_otlp::OtlpConfig;
//! use beacon_sdk::{Context, KeyValue, Resource};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let resource = Resource::builder()
//!     .with_service_name("cart-service")
//!     .with_attribute(KeyValue::new("library.language", "rust"))
//!     .build()?;
//! let telemetry = beacon_otlp::install(
//!     OtlpConfig::from_env()
//!         .with_export_interval(Duration::from_secs(3))
//!         .with_resource(resource),
//! )?;
//!
//! let tracer = telemetry.tracer_provider().tracer("cart");
//! let (_cx, mut span) = tracer.start("checkout", &Context::new());
//! span.end();
//!
//! // shutting down blocks while the last batches are exported
//! tokio::task::spawn_blocking(move || telemetry.shutdown(Duration::from_secs(5))).await??;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`OtlpConfig::from_env`] reads the standard variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `localhost:4317` |
//! | `OTEL_EXPORTER_OTLP_INSECURE` | `true` |
//! | `OTEL_EXPORTER_OTLP_TIMEOUT` | `10000` (ms) |
//!
//! The batch span processor and the periodic reader read their own
//! `OTEL_BSP_*` and `OTEL_METRIC_EXPORT_*` variables. TLS needs the `tls`
//! feature.
//!
//! [`TracerProvider`]: beacon_sdk::trace::TracerProvider
//! [`MeterProvider`]: beacon_sdk::metrics::MeterProvider
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod config;
mod error;
mod exporter;
mod telemetry;
pub mod transform;

pub use config::{
    OtlpConfig, TransportSecurity, OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT,
    OTEL_EXPORTER_OTLP_INSECURE, OTEL_EXPORTER_OTLP_TIMEOUT, OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT,
};
pub use error::Error;
pub use exporter::build_channel;
pub use exporter::metrics::OtlpMetricExporter;
pub use exporter::trace::OtlpSpanExporter;
pub use telemetry::{install, Telemetry};
