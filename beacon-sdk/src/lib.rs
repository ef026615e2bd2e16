//! # Beacon SDK
//!
//! The in-process telemetry emission core. It produces attributed span and
//! metric records for each unit of work, buffers them, and hands them to an
//! exporter from dedicated background threads so that recording never waits
//! on the network.
//!
//! The main entry points are:
//!
//! * [`trace::TracerProvider`] and [`trace::Tracer`] to open and close spans,
//! * [`metrics::MeterProvider`] and [`metrics::Meter`] to register counters,
//!   histograms and gauges,
//! * [`metrics::ProcessMemorySampler`] for the periodic process memory gauge,
//! * [`propagation`] to move a [`Context`] across process boundaries.
//!
//! Context is always explicit: every call that needs the active span takes a
//! [`Context`] value. There is no process-global provider.
//!
//! ```
//! use beacon_sdk::{trace::TracerProvider, Context, KeyValue};
//!
//! let provider = TracerProvider::builder().build();
//! let tracer = provider.tracer("example");
//!
//! let (cx, mut parent) = tracer.start("parent", &Context::new());
//! let (_, mut child) = tracer.start("child", &cx);
//! child.set_attribute(KeyValue::new("status", "ok"));
//! child.end();
//! parent.end();
//!
//! provider.shutdown().unwrap();
//! ```
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

mod internal_logging;

pub mod baggage;
pub mod common;
pub mod context;
pub mod error;
pub mod export;
pub mod metrics;
pub mod propagation;
pub mod resource;
pub mod trace;

pub use baggage::Baggage;
pub use common::{InstrumentationScope, Key, KeyValue, Value};
pub use context::Context;
pub use error::{SdkError, SdkResult};
pub use resource::Resource;

#[doc(hidden)]
pub mod _private {
    pub use tracing::{debug, error, info, warn};
}
