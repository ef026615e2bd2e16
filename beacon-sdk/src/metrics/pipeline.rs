use crate::common::InstrumentationScope;
use crate::error::{SdkError, SdkResult};
use crate::metrics::data::{Metric, ResourceMetrics, ScopeMetrics};
use crate::metrics::instrument::{validate_instrument_config, InstrumentDescriptor};
use crate::metrics::internal::ComputeAggregation;
use crate::resource::Resource;
use crate::beacon_debug;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Connects the instruments of a [`MeterProvider`] to its readers.
///
/// Every instrument registered through a meter of the provider ends up here.
/// Readers hold a weak reference and call [`Pipeline::produce`] to snapshot all
/// instruments at once.
///
/// [`MeterProvider`]: crate::metrics::MeterProvider
pub struct Pipeline {
    resource: Resource,
    start_time: SystemTime,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    scopes: Vec<(InstrumentationScope, Vec<Instrument>)>,
    identities: HashSet<(Cow<'static, str>, Cow<'static, str>)>,
}

#[derive(Clone)]
struct Instrument {
    descriptor: InstrumentDescriptor,
    aggregate: Arc<dyn ComputeAggregation>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("resource", &self.resource)
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl Pipeline {
    pub(crate) fn new(resource: Resource) -> Self {
        Pipeline {
            resource,
            start_time: SystemTime::now(),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// The resource reported with every snapshot.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Adds an instrument to the pipeline.
    ///
    /// The (name, unit) identity must be unique across all scopes of the
    /// provider.
    pub(crate) fn register(
        &self,
        scope: &InstrumentationScope,
        descriptor: InstrumentDescriptor,
        aggregate: Arc<dyn ComputeAggregation>,
    ) -> SdkResult<()> {
        validate_instrument_config(&descriptor.name, &descriptor.unit)?;

        let mut registry = self.registry.lock()?;
        let identity = (descriptor.name.clone(), descriptor.unit.clone());
        if registry.identities.contains(&identity) {
            return Err(SdkError::DuplicateInstrument {
                name: descriptor.name.to_string(),
                unit: descriptor.unit.to_string(),
            });
        }
        registry.identities.insert(identity);

        beacon_debug!(
            name: "Metrics.InstrumentRegistered",
            instrument = descriptor.name.to_string(),
            kind = format!("{:?}", descriptor.kind),
            scope = scope.name()
        );
        let instrument = Instrument {
            descriptor,
            aggregate,
        };
        match registry.scopes.iter_mut().find(|(s, _)| s == scope) {
            Some((_, instruments)) => instruments.push(instrument),
            None => registry.scopes.push((scope.clone(), vec![instrument])),
        }
        Ok(())
    }

    /// Writes a snapshot of every registered instrument into `rm`.
    ///
    /// Instruments without data points, such as an observable gauge whose
    /// sampler failed, are left out. Scopes without any metric are left out.
    pub fn produce(&self, rm: &mut ResourceMetrics) -> SdkResult<()> {
        // aggregates are computed outside the lock so samplers may register instruments
        let scopes = self.registry.lock()?.scopes.clone();

        let now = SystemTime::now();
        rm.resource = self.resource.clone();
        rm.scope_metrics.clear();
        for (scope, instruments) in scopes {
            let metrics: Vec<Metric> = instruments
                .iter()
                .filter_map(|instrument| {
                    let data = instrument.aggregate.compute(self.start_time, now)?;
                    Some(Metric {
                        name: instrument.descriptor.name.clone(),
                        description: instrument.descriptor.description.clone(),
                        unit: instrument.descriptor.unit.clone(),
                        data,
                    })
                })
                .collect();
            if !metrics.is_empty() {
                rm.scope_metrics.push(ScopeMetrics { scope, metrics });
            }
        }
        Ok(())
    }
}
