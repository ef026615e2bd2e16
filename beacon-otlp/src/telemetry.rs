use crate::config::OtlpConfig;
use crate::exporter::build_channel;
use crate::{OtlpMetricExporter, OtlpSpanExporter};
use beacon_sdk::metrics::{MeterProvider, PeriodicReader, ProcessMemorySampler};
use beacon_sdk::propagation::{
    BaggagePropagator, TextMapCompositePropagator, TraceContextPropagator,
};
use beacon_sdk::trace::TracerProvider;
use beacon_sdk::{beacon_debug, beacon_info, Resource, SdkError, SdkResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Name of the meter owning the process memory gauge.
const PROCESS_METER_NAME: &str = "process";

/// Installs the trace and metric pipelines exporting to the collector
/// described by `config`.
///
/// Must be called from within a tokio runtime; see [`build_channel`].
///
/// [`build_channel`]: crate::build_channel
pub fn install(mut config: OtlpConfig) -> SdkResult<Telemetry> {
    let (channel, runtime) = build_channel(&config)?;
    let resource = match config.take_resource() {
        Some(resource) => resource,
        None => Resource::builder().build()?,
    };

    let tracer_provider = TracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(OtlpSpanExporter::new(channel.clone(), runtime.clone()))
        .build();

    let mut reader = PeriodicReader::builder(OtlpMetricExporter::new(channel, runtime));
    if let Some(interval) = config.export_interval() {
        reader = reader.with_interval(interval);
    }
    let meter_provider = MeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader.build())
        .build();

    let sampler = match config.memory_sample_interval() {
        Some(interval) => {
            let sampler = ProcessMemorySampler::start(interval)?;
            sampler.register_gauge(&meter_provider.meter(PROCESS_METER_NAME))?;
            Some(sampler)
        }
        None => None,
    };

    let propagator = TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]);

    beacon_info!(
        name: "Telemetry.Installed",
        endpoint = config.endpoint_uri(),
        memory_sampler = sampler.is_some()
    );
    Ok(Telemetry {
        tracer_provider,
        meter_provider,
        sampler,
        propagator: Arc::new(propagator),
        is_shutdown: AtomicBool::new(false),
    })
}

/// The pipelines installed by [`install`].
///
/// Providers are handles; clone them into the code that records telemetry.
/// [`Telemetry::shutdown`] stops everything in order: the memory sampler
/// first, then the trace pipeline, then the metric pipeline.
pub struct Telemetry {
    tracer_provider: TracerProvider,
    meter_provider: MeterProvider,
    sampler: Option<ProcessMemorySampler>,
    propagator: Arc<TextMapCompositePropagator>,
    is_shutdown: AtomicBool,
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("tracer_provider", &self.tracer_provider)
            .field("meter_provider", &self.meter_provider)
            .field("sampler", &self.sampler)
            .field("is_shutdown", &self.is_shutdown)
            .finish()
    }
}

impl Telemetry {
    /// The trace pipeline.
    pub fn tracer_provider(&self) -> &TracerProvider {
        &self.tracer_provider
    }

    /// The metric pipeline.
    pub fn meter_provider(&self) -> &MeterProvider {
        &self.meter_provider
    }

    /// The process memory sampler, unless it was disabled.
    pub fn memory_sampler(&self) -> Option<&ProcessMemorySampler> {
        self.sampler.as_ref()
    }

    /// The `traceparent` + `baggage` propagator.
    pub fn propagator(&self) -> Arc<TextMapCompositePropagator> {
        self.propagator.clone()
    }

    /// Stops the sampler and shuts both providers down, each within
    /// `timeout`.
    ///
    /// Blocks while the final batches are exported, so call it outside of
    /// async code. Only the first call does any work.
    pub fn shutdown(&self, timeout: Duration) -> SdkResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            beacon_debug!(name: "Telemetry.AlreadyShutdown");
            return Ok(());
        }
        if let Some(sampler) = &self.sampler {
            sampler.stop();
        }

        let mut errors: Vec<SdkError> = [
            self.tracer_provider.shutdown_with_timeout(timeout),
            self.meter_provider.shutdown_with_timeout(timeout),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();
        beacon_debug!(name: "Telemetry.Shutdown", error_count = errors.len());

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(SdkError::InternalFailure(format!("errors: {errors:?}"))),
        }
    }
}
