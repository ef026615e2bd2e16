use crate::error::{SdkError, SdkResult};
use crate::export::{
    retry_with_exponential_backoff, AtomicPipelineState, PipelineState, RetryPolicy,
};
use crate::metrics::data::ResourceMetrics;
use crate::metrics::exporter::PushMetricExporter;
use crate::metrics::reader::MetricReader;
use crate::metrics::Pipeline;
use crate::{beacon_debug, beacon_error, beacon_info, beacon_warn};
use futures_executor::block_on;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use std::{env, fmt, thread};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

const METRIC_EXPORT_INTERVAL_NAME: &str = "OTEL_METRIC_EXPORT_INTERVAL";
const METRIC_EXPORT_TIMEOUT_NAME: &str = "OTEL_METRIC_EXPORT_TIMEOUT";

const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Configuration options for [PeriodicReader].
///
/// A periodic reader is a [MetricReader] that collects and exports metric data
/// to the exporter at a defined interval.
///
/// By default, the returned [MetricReader] will collect and export data every
/// 60 seconds. The export time is not counted towards the interval between
/// attempts.
#[derive(Debug)]
pub struct PeriodicReaderBuilder<E> {
    interval: Duration,
    timeout: Duration,
    retry_policy: RetryPolicy,
    exporter: E,
}

impl<E> PeriodicReaderBuilder<E>
where
    E: PushMetricExporter,
{
    fn new(exporter: E) -> Self {
        let interval = env::var(METRIC_EXPORT_INTERVAL_NAME)
            .ok()
            .and_then(|v| v.parse().map(Duration::from_millis).ok())
            .filter(|interval| !interval.is_zero())
            .unwrap_or(DEFAULT_INTERVAL);
        let timeout = env::var(METRIC_EXPORT_TIMEOUT_NAME)
            .ok()
            .and_then(|v| v.parse().map(Duration::from_millis).ok())
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT);

        PeriodicReaderBuilder {
            interval,
            timeout,
            retry_policy: RetryPolicy::default(),
            exporter,
        }
    }

    /// Configures the intervening time between exports for a [PeriodicReader].
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_INTERVAL`
    /// environment variable.
    ///
    /// If this option is not used or `interval` is equal to zero, 60 seconds is
    /// used as the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    /// Configures how long [`force_flush`](MetricReader::force_flush) waits for
    /// an export to complete.
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_TIMEOUT`
    /// environment variable.
    ///
    /// If this option is not used or `timeout` is equal to zero, 30 seconds is used
    /// as the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Configures how failed timer and flush exports are retried. The final
    /// export on shutdown is never retried.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Create a [PeriodicReader] with the given config.
    pub fn build(self) -> PeriodicReader<E> {
        PeriodicReader::new(self)
    }
}

/// A [MetricReader] that continuously collects and exports metric data at a set
/// interval.
///
/// Collection and export run on a dedicated thread, so neither recording nor
/// the caller of [`force_flush`](MetricReader::force_flush) touch the exporter
/// directly. Observable gauges are sampled on that thread as well.
///
/// # Example
///
/// ```
/// use beacon_sdk::metrics::{InMemoryMetricExporter, MeterProvider, PeriodicReader};
/// use std::time::Duration;
///
/// let exporter = InMemoryMetricExporter::default();
/// let reader = PeriodicReader::builder(exporter.clone())
///     .with_interval(Duration::from_secs(3))
///     .build();
/// let provider = MeterProvider::builder().with_reader(reader).build();
///
/// let counter = provider.meter("example").i64_counter("requests").build().unwrap();
/// counter.add(1, &[]).unwrap();
///
/// provider.shutdown().unwrap();
/// assert_eq!(exporter.get_finished_metrics().unwrap().len(), 1);
/// ```
pub struct PeriodicReader<E: PushMetricExporter> {
    inner: Arc<PeriodicReaderInner<E>>,
    message_sender: SyncSender<Message>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<E: PushMetricExporter> fmt::Debug for PeriodicReader<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicReader")
            .field("state", &self.inner.state.load())
            .field("interval", &self.inner.interval)
            .finish()
    }
}

struct PeriodicReaderInner<E> {
    exporter: E,
    pipeline: Mutex<Option<Weak<Pipeline>>>,
    state: AtomicPipelineState,
    interval: Duration,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

#[derive(Debug)]
enum Message {
    Flush(SyncSender<SdkResult<()>>),
    Shutdown(SyncSender<SdkResult<()>>),
}

impl<E: PushMetricExporter> PeriodicReader<E> {
    /// Configuration options for a periodic reader
    pub fn builder(exporter: E) -> PeriodicReaderBuilder<E> {
        PeriodicReaderBuilder::new(exporter)
    }

    fn new(builder: PeriodicReaderBuilder<E>) -> Self {
        let (message_sender, message_receiver) = sync_channel(CONTROL_CHANNEL_CAPACITY);
        let inner = Arc::new(PeriodicReaderInner {
            exporter: builder.exporter,
            pipeline: Mutex::new(None),
            state: AtomicPipelineState::new(),
            interval: builder.interval,
            timeout: builder.timeout,
            retry_policy: builder.retry_policy,
        });

        let worker_inner = Arc::downgrade(&inner);
        let handle = thread::Builder::new()
            .name("PeriodicReaderThread".to_string())
            .spawn(move || run(worker_inner, message_receiver));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                beacon_error!(
                    name: "PeriodicReader.ThreadStartError",
                    error = format!("{err:?}")
                );
                inner.state.advance(PipelineState::Stopped);
                None
            }
        };

        PeriodicReader {
            inner,
            message_sender,
            handle: Mutex::new(handle),
        }
    }

    /// Current lifecycle state of the export pipeline.
    pub fn state(&self) -> PipelineState {
        self.inner.state.load()
    }

    fn send_control(&self, message: Message) -> SdkResult<()> {
        self.message_sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => {
                SdkError::InternalFailure("control channel of the metric reader is full".into())
            }
            TrySendError::Disconnected(_) => {
                SdkError::InternalFailure("metric reader thread is not running".into())
            }
        })
    }
}

fn run<E: PushMetricExporter>(inner: Weak<PeriodicReaderInner<E>>, messages: Receiver<Message>) {
    let Some(interval) = inner.upgrade().map(|inner| {
        inner.state.advance(PipelineState::Running);
        inner.interval
    }) else {
        return;
    };
    beacon_info!(
        name: "PeriodicReader.ThreadStarted",
        interval_ms = interval.as_millis() as u64
    );

    let mut next_export = Instant::now() + interval;
    loop {
        let remaining = next_export.saturating_duration_since(Instant::now());
        match messages.recv_timeout(remaining) {
            Ok(Message::Flush(sender)) => {
                beacon_debug!(name: "PeriodicReader.ExportingDueToFlush");
                let result = match inner.upgrade() {
                    Some(inner) => inner.collect_and_export(&inner.retry_policy),
                    None => Err(SdkError::AlreadyShutdown),
                };
                let _ = sender.send(result);
            }
            Ok(Message::Shutdown(sender)) => {
                beacon_debug!(name: "PeriodicReader.ExportingDueToShutdown");
                let result = match inner.upgrade() {
                    Some(inner) => {
                        let export = inner.collect_and_export(&RetryPolicy::none());
                        let shutdown = inner.exporter.shutdown_with_timeout(inner.timeout);
                        inner.state.advance(PipelineState::Stopped);
                        export.and(shutdown)
                    }
                    None => Ok(()),
                };
                let _ = sender.send(result);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                beacon_debug!(name: "PeriodicReader.ExportingDueToTimer");
                let _ = inner.collect_and_export(&inner.retry_policy);
                next_export = Instant::now() + interval;
            }
            // reader dropped without shutdown
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    beacon_info!(name: "PeriodicReader.ThreadStopped");
}

impl<E: PushMetricExporter> PeriodicReaderInner<E> {
    fn produce(&self, rm: &mut ResourceMetrics) -> SdkResult<()> {
        let pipeline = self.pipeline.lock()?;
        match pipeline.as_ref() {
            Some(pipeline) => pipeline
                .upgrade()
                .ok_or_else(|| SdkError::InternalFailure("pipeline is dropped".into()))?
                .produce(rm),
            None => Err(SdkError::InternalFailure(
                "pipeline is not registered".into(),
            )),
        }
    }

    fn collect_and_export(&self, policy: &RetryPolicy) -> SdkResult<()> {
        let mut rm = ResourceMetrics::default();
        if let Err(err) = self.produce(&mut rm) {
            beacon_warn!(name: "PeriodicReader.CollectError", error = format!("{err}"));
            return Err(err);
        }
        if rm.scope_metrics.is_empty() {
            beacon_debug!(name: "PeriodicReader.NoMetricsCollected");
            return Ok(());
        }

        let result = retry_with_exponential_backoff(policy, "PeriodicReader.Export", || {
            block_on(self.exporter.export(&rm))
        });
        if let Err(err) = &result {
            beacon_error!(
                name: "PeriodicReader.ExportFailed",
                message = "The metric snapshot was dropped.",
                error = format!("{err}")
            );
        }
        result
    }
}

impl<E: PushMetricExporter> MetricReader for PeriodicReader<E> {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        if let Ok(mut inner) = self.inner.pipeline.lock() {
            *inner = Some(pipeline);
        }
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> SdkResult<()> {
        if self.inner.state.load() >= PipelineState::ShuttingDown {
            return Err(SdkError::AlreadyShutdown);
        }
        self.inner.produce(rm)
    }

    fn force_flush(&self) -> SdkResult<()> {
        if self.inner.state.load() >= PipelineState::ShuttingDown {
            return Err(SdkError::AlreadyShutdown);
        }
        let (sender, receiver) = sync_channel(1);
        self.send_control(Message::Flush(sender))?;

        receiver
            .recv_timeout(self.inner.timeout)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => SdkError::ShutdownTimeout(self.inner.timeout),
                RecvTimeoutError::Disconnected => {
                    SdkError::InternalFailure("metric reader thread exited".into())
                }
            })?
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()> {
        if self.inner.state.advance(PipelineState::ShuttingDown) >= PipelineState::ShuttingDown {
            beacon_debug!(name: "PeriodicReader.AlreadyShutdown");
            return Ok(());
        }

        let (sender, receiver) = sync_channel(1);
        self.send_control(Message::Shutdown(sender))?;

        match receiver.recv_timeout(timeout) {
            Ok(result) => {
                if let Some(handle) = self.handle.lock()?.take() {
                    if handle.join().is_err() {
                        return Err(SdkError::InternalFailure(
                            "metric reader thread panicked".into(),
                        ));
                    }
                }
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                beacon_error!(
                    name: "PeriodicReader.ShutdownTimeout",
                    timeout_ms = timeout.as_millis() as u64
                );
                Err(SdkError::ShutdownTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SdkError::InternalFailure(
                "metric reader thread exited before shutdown completed".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MeterProvider;
    use std::future::{ready, Future};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, Default)]
    struct MockMetricExporter {
        exported: Arc<Mutex<Vec<ResourceMetrics>>>,
        attempts: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
        failures_left: Arc<AtomicUsize>,
    }

    impl MockMetricExporter {
        fn failing(times: usize) -> Self {
            let exporter = MockMetricExporter::default();
            exporter.failures_left.store(times, Ordering::SeqCst);
            exporter
        }

        fn exported(&self) -> usize {
            self.exported.lock().unwrap().len()
        }
    }

    impl PushMetricExporter for MockMetricExporter {
        fn export(&self, metrics: &ResourceMetrics) -> impl Future<Output = SdkResult<()>> + Send {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                ready(Err(SdkError::ExportFailure("collector unavailable".into())))
            } else {
                self.exported.lock().unwrap().push(metrics.clone());
                ready(Ok(()))
            }
        }

        fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_retries(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            jitter_ms: 0,
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn provider_with(reader: PeriodicReader<MockMetricExporter>) -> MeterProvider {
        let provider = MeterProvider::builder().with_reader(reader).build();
        let counter = provider.meter("test").i64_counter("ticks").build().unwrap();
        counter.add(1, &[]).unwrap();
        provider
    }

    #[test]
    fn interval_and_timeout_from_env() {
        temp_env::with_vars(
            [
                (METRIC_EXPORT_INTERVAL_NAME, Some("3000")),
                (METRIC_EXPORT_TIMEOUT_NAME, Some("1500")),
            ],
            || {
                let builder = PeriodicReader::builder(MockMetricExporter::default());
                assert_eq!(builder.interval, Duration::from_millis(3000));
                assert_eq!(builder.timeout, Duration::from_millis(1500));

                let builder = builder.with_interval(Duration::from_secs(1));
                assert_eq!(builder.interval, Duration::from_secs(1));
            },
        );
    }

    #[test]
    fn invalid_env_values_fall_back_to_defaults() {
        temp_env::with_vars(
            [
                (METRIC_EXPORT_INTERVAL_NAME, Some("0")),
                (METRIC_EXPORT_TIMEOUT_NAME, Some("soon")),
            ],
            || {
                let builder = PeriodicReader::builder(MockMetricExporter::default())
                    .with_interval(Duration::ZERO);
                assert_eq!(builder.interval, DEFAULT_INTERVAL);
                assert_eq!(builder.timeout, DEFAULT_TIMEOUT);
            },
        );
    }

    #[test]
    fn exports_on_every_interval() {
        let exporter = MockMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_millis(20))
            .build();
        let provider = provider_with(reader);

        assert!(wait_for(|| exporter.exported() >= 2));
        provider.shutdown().unwrap();
    }

    #[test]
    fn force_flush_exports_immediately() {
        let exporter = MockMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_secs(3600))
            .build();
        let provider = provider_with(reader);

        provider.force_flush().unwrap();
        assert_eq!(exporter.exported(), 1);
        provider.shutdown().unwrap();
    }

    #[test]
    fn shutdown_exports_once_and_is_idempotent() {
        let exporter = MockMetricExporter::default();
        let reader = Arc::new(
            PeriodicReader::builder(exporter.clone())
                .with_interval(Duration::from_secs(3600))
                .build(),
        );
        let provider = MeterProvider::builder().with_reader(reader.clone()).build();
        provider
            .meter("test")
            .i64_counter("ticks")
            .build()
            .unwrap()
            .add(1, &[])
            .unwrap();

        assert!(reader.shutdown().is_ok());
        assert!(reader.shutdown().is_ok());
        assert_eq!(reader.state(), PipelineState::Stopped);
        assert_eq!(exporter.exported(), 1);
        assert_eq!(exporter.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(reader.force_flush(), Err(SdkError::AlreadyShutdown));
    }

    #[test]
    fn failed_export_is_retried_and_reader_keeps_running() {
        let exporter = MockMetricExporter::failing(5);
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_millis(20))
            .with_retry_policy(fast_retries(2))
            .build();
        let provider = provider_with(reader);

        // first tick: 3 failed attempts, second tick: 2 failures then success
        assert!(wait_for(|| exporter.exported() >= 1));
        assert!(exporter.attempts.load(Ordering::SeqCst) >= 6);
        provider.shutdown().unwrap();
    }

    #[test]
    fn shutdown_export_is_not_retried() {
        let exporter = MockMetricExporter::failing(1);
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_secs(3600))
            .with_retry_policy(fast_retries(3))
            .build();
        let provider = provider_with(reader);

        assert!(matches!(provider.shutdown(), Err(SdkError::ExportFailure(_))));
        assert_eq!(exporter.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(exporter.exported(), 0);
    }

    #[test]
    fn nothing_is_exported_without_data() {
        let exporter = MockMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_secs(3600))
            .build();
        let provider = MeterProvider::builder().with_reader(reader).build();
        provider.force_flush().unwrap();
        assert_eq!(exporter.attempts.load(Ordering::SeqCst), 0);
    }
}
