//! The metrics half of the emission core.
//!
//! ## Configuration
//!
//! A [MeterProvider] owns the [Resource] reported with every snapshot and the
//! [MetricReader]s collecting them. Instruments are created through the
//! [Meter]s it hands out; recording only touches atomics and short critical
//! sections, never the exporter.
//!
//! All sums and histograms are cumulative.
//!
//! ### Example
//!
//! ```
//! use beacon_sdk::metrics::{InMemoryMetricExporter, MeterProvider, PeriodicReader};
//! use beacon_sdk::{KeyValue, Resource};
//!
//! let resource = Resource::builder().with_service_name("cart-service").build().unwrap();
//! let exporter = InMemoryMetricExporter::default();
//!
//! let meter_provider = MeterProvider::builder()
//!     .with_resource(resource)
//!     .with_reader(PeriodicReader::builder(exporter.clone()).build())
//!     .build();
//!
//! let meter = meter_provider.meter("my_app");
//! let counter = meter
//!     .i64_counter("api.request.error_counter")
//!     .with_unit("{call}")
//!     .with_description("Number of erroneous API calls.")
//!     .build()
//!     .unwrap();
//! counter.add(1, &[KeyValue::new("route", "/")]).unwrap();
//!
//! // shutdown the provider at the end of the application to ensure any metrics not yet
//! // exported are flushed.
//! meter_provider.shutdown().unwrap();
//! assert!(exporter.get_finished_metrics().unwrap()[0]
//!     .metric("api.request.error_counter")
//!     .is_some());
//! ```
//!
//! [Resource]: crate::Resource

pub mod data;
pub mod exporter;
mod in_memory_exporter;
mod instrument;
mod internal;
mod manual_reader;
mod meter;
mod meter_provider;
mod periodic_reader;
mod pipeline;
pub mod process;
pub mod reader;

pub use exporter::PushMetricExporter;
pub use in_memory_exporter::InMemoryMetricExporter;
pub use instrument::{
    Counter, Gauge, GaugeSampler, Histogram, HistogramBuilder, InstrumentBuilder, InstrumentKind,
    ObservableGauge, ObservableGaugeBuilder, UpDownCounter,
};
pub use manual_reader::ManualReader;
pub use meter::Meter;
pub use meter_provider::{MeterProvider, MeterProviderBuilder};
pub use periodic_reader::{PeriodicReader, PeriodicReaderBuilder};
pub use pipeline::Pipeline;
pub use process::{MemoryGauge, MemoryReader, ProcessMemorySampler, SysinfoMemoryReader};
pub use reader::MetricReader;
