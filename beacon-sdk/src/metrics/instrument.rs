//! Instrument handles and the builders that register them.
use crate::common::KeyValue;
use crate::error::{SdkError, SdkResult};
use crate::metrics::internal::{
    HistogramAggregate, LastValueAggregate, Measure, Number, ObservableGaugeAggregate,
    SumAggregate,
};
use crate::metrics::Meter;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

const INSTRUMENT_NAME_MAX_LENGTH: usize = 255;
// maximum length of instrument unit name
const INSTRUMENT_UNIT_NAME_MAX_LENGTH: usize = 63;
const INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS: [char; 4] = ['_', '.', '-', '/'];

// instrument validation error strings
const INSTRUMENT_NAME_EMPTY: &str = "instrument name must be non-empty";
const INSTRUMENT_NAME_LENGTH: &str = "instrument name must be less than 256 characters";
const INSTRUMENT_NAME_INVALID_CHAR: &str =
    "characters in instrument name must be ASCII and belong to the alphanumeric characters, '_', '.', '-' and '/'";
const INSTRUMENT_NAME_FIRST_ALPHABETIC: &str =
    "instrument name must start with an alphabetic character";
const INSTRUMENT_UNIT_LENGTH: &str = "instrument unit must be less than 64 characters";
const INSTRUMENT_UNIT_INVALID_CHAR: &str = "characters in instrument unit must be ASCII";

/// Default histogram boundaries.
pub(crate) const DEFAULT_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0,
    7500.0, 10000.0,
];

/// The identifier of a group of instruments that all perform the same function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Identifies a group of instruments that record increasing values
    /// synchronously with the code path they are measuring.
    Counter,
    /// Identifies a group of instruments that record increasing and decreasing
    /// values synchronously with the code path they are measuring.
    UpDownCounter,
    /// Identifies a group of instruments that record a distribution of values
    /// synchronously with the code path they are measuring.
    Histogram,
    /// Identifies a group of instruments that record current values
    /// synchronously with the code path they are measuring.
    Gauge,
    /// Identifies a group of instruments that record current values in an
    /// asynchronous callback.
    ObservableGauge,
}

/// Identity and metadata of a registered instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct InstrumentDescriptor {
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Cow<'static, str>,
    pub(crate) unit: Cow<'static, str>,
    pub(crate) kind: InstrumentKind,
}

pub(crate) fn validate_instrument_config(name: &str, unit: &str) -> SdkResult<()> {
    validate_instrument_name(name).and_then(|_| validate_instrument_unit(unit))
}

fn validate_instrument_name(name: &str) -> SdkResult<()> {
    if name.is_empty() {
        return Err(SdkError::Configuration(INSTRUMENT_NAME_EMPTY.into()));
    }
    if name.len() > INSTRUMENT_NAME_MAX_LENGTH {
        return Err(SdkError::Configuration(INSTRUMENT_NAME_LENGTH.into()));
    }
    if name.starts_with(|c: char| !c.is_ascii_alphabetic()) {
        return Err(SdkError::Configuration(
            INSTRUMENT_NAME_FIRST_ALPHABETIC.into(),
        ));
    }
    if name.contains(|c: char| {
        !c.is_ascii_alphanumeric() && !INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS.contains(&c)
    }) {
        return Err(SdkError::Configuration(INSTRUMENT_NAME_INVALID_CHAR.into()));
    }
    Ok(())
}

fn validate_instrument_unit(unit: &str) -> SdkResult<()> {
    if unit.len() > INSTRUMENT_UNIT_NAME_MAX_LENGTH {
        return Err(SdkError::Configuration(INSTRUMENT_UNIT_LENGTH.into()));
    }
    if unit.contains(|c: char| !c.is_ascii()) {
        return Err(SdkError::Configuration(INSTRUMENT_UNIT_INVALID_CHAR.into()));
    }
    Ok(())
}

fn validate_boundaries(boundaries: &[f64]) -> SdkResult<()> {
    if boundaries.iter().any(|bound| !bound.is_finite()) {
        return Err(SdkError::Configuration(
            "histogram boundaries must be finite".into(),
        ));
    }
    if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(SdkError::Configuration(
            "histogram boundaries must be sorted and unique".into(),
        ));
    }
    Ok(())
}

fn add_increment<T: Number>(measure: &dyn Measure<T>, value: T, attributes: &[KeyValue]) -> SdkResult<()> {
    if !value.is_finite() || value < T::default() {
        return Err(SdkError::InvalidArgument(format!(
            "counter increment must be a finite non-negative number, got {value:?}"
        )));
    }
    measure.call(value, attributes);
    Ok(())
}

fn record_finite<T: Number>(measure: &dyn Measure<T>, value: T, attributes: &[KeyValue]) -> SdkResult<()> {
    if !value.is_finite() {
        return Err(SdkError::InvalidArgument(format!(
            "recorded value must be finite, got {value:?}"
        )));
    }
    measure.call(value, attributes);
    Ok(())
}

/// An instrument that records increasing values.
///
/// Cloning is cheap; clones record into the same time series.
#[derive(Clone)]
pub struct Counter<T> {
    measure: Arc<dyn Measure<T>>,
}

impl<T> fmt::Debug for Counter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Counter")
    }
}

impl Counter<i64> {
    /// Records an increment to the counter.
    ///
    /// Negative increments are rejected with [`SdkError::InvalidArgument`]
    /// and leave the stored value untouched.
    pub fn add(&self, value: i64, attributes: &[KeyValue]) -> SdkResult<()> {
        add_increment(&*self.measure, value, attributes)
    }
}

impl Counter<f64> {
    /// Records an increment to the counter.
    ///
    /// Negative, NaN and infinite increments are rejected with
    /// [`SdkError::InvalidArgument`] and leave the stored value untouched.
    pub fn add(&self, value: f64, attributes: &[KeyValue]) -> SdkResult<()> {
        add_increment(&*self.measure, value, attributes)
    }
}

/// An instrument that records increasing or decreasing values.
#[derive(Clone)]
pub struct UpDownCounter<T> {
    measure: Arc<dyn Measure<T>>,
}

impl<T> fmt::Debug for UpDownCounter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpDownCounter")
    }
}

impl UpDownCounter<i64> {
    /// Records a change to the counter.
    pub fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.measure.call(value, attributes)
    }
}

/// An instrument that records independent values, keeping the last one
/// written per attribute set.
#[derive(Clone)]
pub struct Gauge<T> {
    measure: Arc<dyn Measure<T>>,
}

impl<T> fmt::Debug for Gauge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Gauge")
    }
}

impl Gauge<i64> {
    /// Records the current value.
    pub fn record(&self, value: i64, attributes: &[KeyValue]) -> SdkResult<()> {
        record_finite(&*self.measure, value, attributes)
    }
}

impl Gauge<f64> {
    /// Records the current value. NaN and infinite values are rejected.
    pub fn record(&self, value: f64, attributes: &[KeyValue]) -> SdkResult<()> {
        record_finite(&*self.measure, value, attributes)
    }
}

/// An instrument that records a distribution of values.
#[derive(Clone)]
pub struct Histogram {
    measure: Arc<dyn Measure<f64>>,
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Histogram")
    }
}

impl Histogram {
    /// Adds an additional value to the distribution.
    ///
    /// NaN and infinite values are rejected with [`SdkError::InvalidArgument`].
    pub fn record(&self, value: f64, attributes: &[KeyValue]) -> SdkResult<()> {
        record_finite(&*self.measure, value, attributes)
    }
}

/// Registration handle of an observable gauge.
///
/// The gauge is sampled by the metric readers; the handle only identifies
/// the registered instrument.
#[derive(Clone, Debug)]
pub struct ObservableGauge {
    name: Cow<'static, str>,
}

impl ObservableGauge {
    /// The name the gauge was registered with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Supplies the current value of an observable gauge.
///
/// `sample` is called once per collection, from the thread of the reader
/// collecting. An error, a non-finite value or a panic skips the data point
/// of that collection only.
pub trait GaugeSampler: Send + Sync + 'static {
    /// Returns the current value.
    fn sample(&self) -> SdkResult<f64>;
}

impl<T: GaugeSampler + ?Sized> GaugeSampler for Arc<T> {
    fn sample(&self) -> SdkResult<f64> {
        (**self).sample()
    }
}

struct CallbackSampler<F>(F);

impl<F> GaugeSampler for CallbackSampler<F>
where
    F: Fn() -> SdkResult<f64> + Send + Sync + 'static,
{
    fn sample(&self) -> SdkResult<f64> {
        (self.0)()
    }
}

/// Configuration for a synchronous instrument.
pub struct InstrumentBuilder<'a, I> {
    meter: &'a Meter,
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    _instrument: PhantomData<I>,
}

impl<I> fmt::Debug for InstrumentBuilder<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<I>())
            .finish()
    }
}

impl<'a, I> InstrumentBuilder<'a, I> {
    pub(crate) fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        InstrumentBuilder {
            meter,
            name,
            description: None,
            unit: None,
            _instrument: PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Unit is case sensitive(`kb` is not the same as `kB`).
    ///
    /// Unit must be:
    /// - ASCII string
    /// - No longer than 63 characters
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    fn descriptor(&self, kind: InstrumentKind) -> InstrumentDescriptor {
        InstrumentDescriptor {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            unit: self.unit.clone().unwrap_or_default(),
            kind,
        }
    }
}

impl InstrumentBuilder<'_, Counter<i64>> {
    /// Validates the instrument configuration and registers a new counter.
    ///
    /// Fails with [`SdkError::DuplicateInstrument`] if an instrument with the
    /// same name and unit is already registered in the provider.
    pub fn build(self) -> SdkResult<Counter<i64>> {
        let aggregate = Arc::new(SumAggregate::<i64>::new(true));
        self.meter
            .register(self.descriptor(InstrumentKind::Counter), aggregate.clone())?;
        Ok(Counter { measure: aggregate })
    }
}

impl InstrumentBuilder<'_, Counter<f64>> {
    /// Validates the instrument configuration and registers a new counter.
    pub fn build(self) -> SdkResult<Counter<f64>> {
        let aggregate = Arc::new(SumAggregate::<f64>::new(true));
        self.meter
            .register(self.descriptor(InstrumentKind::Counter), aggregate.clone())?;
        Ok(Counter { measure: aggregate })
    }
}

impl InstrumentBuilder<'_, UpDownCounter<i64>> {
    /// Validates the instrument configuration and registers a new up-down counter.
    pub fn build(self) -> SdkResult<UpDownCounter<i64>> {
        let aggregate = Arc::new(SumAggregate::<i64>::new(false));
        self.meter.register(
            self.descriptor(InstrumentKind::UpDownCounter),
            aggregate.clone(),
        )?;
        Ok(UpDownCounter { measure: aggregate })
    }
}

impl InstrumentBuilder<'_, Gauge<i64>> {
    /// Validates the instrument configuration and registers a new gauge.
    pub fn build(self) -> SdkResult<Gauge<i64>> {
        let aggregate = Arc::new(LastValueAggregate::<i64>::new());
        self.meter
            .register(self.descriptor(InstrumentKind::Gauge), aggregate.clone())?;
        Ok(Gauge { measure: aggregate })
    }
}

impl InstrumentBuilder<'_, Gauge<f64>> {
    /// Validates the instrument configuration and registers a new gauge.
    pub fn build(self) -> SdkResult<Gauge<f64>> {
        let aggregate = Arc::new(LastValueAggregate::<f64>::new());
        self.meter
            .register(self.descriptor(InstrumentKind::Gauge), aggregate.clone())?;
        Ok(Gauge { measure: aggregate })
    }
}

/// Configuration for a [`Histogram`].
pub struct HistogramBuilder<'a> {
    instrument: InstrumentBuilder<'a, Histogram>,
    boundaries: Option<Vec<f64>>,
}

impl fmt::Debug for HistogramBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramBuilder")
            .field("instrument", &self.instrument)
            .field("boundaries", &self.boundaries)
            .finish()
    }
}

impl<'a> HistogramBuilder<'a> {
    pub(crate) fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        HistogramBuilder {
            instrument: InstrumentBuilder::new(meter, name),
            boundaries: None,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.instrument = self.instrument.with_description(description);
        self
    }

    /// Set the unit for this instrument.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.instrument = self.instrument.with_unit(unit);
        self
    }

    /// Set the explicit bucket boundaries.
    ///
    /// Boundaries must be finite, sorted and unique. Defaults to
    /// `[0, 5, 10, 25, 50, 75, 100, 250, 500, 750, 1000, 2500, 5000, 7500, 10000]`.
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }

    /// Validates the instrument configuration and registers a new histogram.
    pub fn build(self) -> SdkResult<Histogram> {
        let boundaries = self
            .boundaries
            .unwrap_or_else(|| DEFAULT_BOUNDARIES.to_vec());
        validate_boundaries(&boundaries)?;

        let aggregate = Arc::new(HistogramAggregate::new(boundaries));
        let instrument = self.instrument;
        instrument
            .meter
            .register(instrument.descriptor(InstrumentKind::Histogram), aggregate.clone())?;
        Ok(Histogram { measure: aggregate })
    }
}

/// Configuration for an [`ObservableGauge`].
pub struct ObservableGaugeBuilder<'a> {
    instrument: InstrumentBuilder<'a, ObservableGauge>,
    sampler: Option<Box<dyn GaugeSampler>>,
}

impl fmt::Debug for ObservableGaugeBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableGaugeBuilder")
            .field("instrument", &self.instrument)
            .field("has_sampler", &self.sampler.is_some())
            .finish()
    }
}

impl<'a> ObservableGaugeBuilder<'a> {
    pub(crate) fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        ObservableGaugeBuilder {
            instrument: InstrumentBuilder::new(meter, name),
            sampler: None,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.instrument = self.instrument.with_description(description);
        self
    }

    /// Set the unit for this instrument.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.instrument = self.instrument.with_unit(unit);
        self
    }

    /// Set the sampler polled on every collection.
    pub fn with_sampler<S: GaugeSampler>(mut self, sampler: S) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Set a closure polled on every collection.
    ///
    /// ```
    /// use beacon_sdk::metrics::MeterProvider;
    ///
    /// let provider = MeterProvider::builder().build();
    /// let meter = provider.meter("example");
    /// let gauge = meter
    ///     .f64_observable_gauge("queue.depth")
    ///     .with_callback(|| Ok(42.0))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(gauge.name(), "queue.depth");
    /// ```
    pub fn with_callback<F>(self, callback: F) -> Self
    where
        F: Fn() -> SdkResult<f64> + Send + Sync + 'static,
    {
        self.with_sampler(CallbackSampler(callback))
    }

    /// Validates the instrument configuration and registers the gauge.
    ///
    /// Fails with [`SdkError::Configuration`] if no sampler was set.
    pub fn build(self) -> SdkResult<ObservableGauge> {
        let Some(sampler) = self.sampler else {
            return Err(SdkError::Configuration(format!(
                "observable gauge `{}` has no sampler",
                self.instrument.name
            )));
        };
        let instrument = self.instrument;
        let aggregate = Arc::new(ObservableGaugeAggregate::new(
            instrument.name.clone(),
            sampler,
        ));
        instrument.meter.register(
            instrument.descriptor(InstrumentKind::ObservableGauge),
            aggregate,
        )?;
        Ok(ObservableGauge {
            name: instrument.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::valid("validateName", None)]
    #[case::starts_with_underscore("_startWithNoneAlphabet", Some(INSTRUMENT_NAME_FIRST_ALPHABETIC))]
    #[case::starts_with_digit("1st", Some(INSTRUMENT_NAME_FIRST_ALPHABETIC))]
    #[case::utf8("utf8char锈", Some(INSTRUMENT_NAME_INVALID_CHAR))]
    #[case::max_length(&"a".repeat(255), None)]
    #[case::too_long(&"a".repeat(256), Some(INSTRUMENT_NAME_LENGTH))]
    #[case::space("invalid name", Some(INSTRUMENT_NAME_INVALID_CHAR))]
    #[case::empty("", Some(INSTRUMENT_NAME_EMPTY))]
    #[case::slash("allow/slash", None)]
    #[case::underscore("allow_under_score", None)]
    #[case::dots("allow.dots.ok", None)]
    #[case::dash("api.request-count", None)]
    fn instrument_name_validation(#[case] name: &str, #[case] expected_error: Option<&str>) {
        let result = validate_instrument_name(name);
        match expected_error {
            None => assert!(result.is_ok(), "{name} should be valid"),
            Some(msg) => assert_eq!(result, Err(SdkError::Configuration(msg.into()))),
        }
    }

    #[rstest]
    #[case::too_long(
        "0123456789012345678901234567890123456789012345678901234567890123",
        Some(INSTRUMENT_UNIT_LENGTH)
    )]
    #[case::utf8("utf8char锈", Some(INSTRUMENT_UNIT_INVALID_CHAR))]
    #[case::kb("kb", None)]
    #[case::rate("Kb/sec", None)]
    #[case::percent("%", None)]
    #[case::annotation("{MB}", None)]
    #[case::empty("", None)]
    fn instrument_unit_validation(#[case] unit: &str, #[case] expected_error: Option<&str>) {
        let result = validate_instrument_unit(unit);
        match expected_error {
            None => assert!(result.is_ok(), "{unit} should be valid"),
            Some(msg) => assert_eq!(result, Err(SdkError::Configuration(msg.into()))),
        }
    }

    #[rstest]
    #[case::default(DEFAULT_BOUNDARIES.to_vec(), true)]
    #[case::empty(vec![], true)]
    #[case::unsorted(vec![1.0, 0.5], false)]
    #[case::duplicate(vec![1.0, 1.0], false)]
    #[case::nan(vec![0.0, f64::NAN], false)]
    #[case::infinite(vec![f64::INFINITY], false)]
    fn boundary_validation(#[case] boundaries: Vec<f64>, #[case] valid: bool) {
        assert_eq!(validate_boundaries(&boundaries).is_ok(), valid);
    }
}
