//! # Span Processor Interface
//!
//! Span processors receive hooks when spans start and end. They are invoked in
//! the order they were registered on the [`TracerProvider`], and all tracers
//! created by that provider share them.
//!
//! ```ascii
//!   +-----+--------------+   +-----------------------+   +-------------------+
//!   |     |              |   |                       |   |                   |
//!   |     |              |   | (Batch)SpanProcessor  |   |    SpanExporter   |
//!   |     |              +---> (Simple)SpanProcessor +--->  (OtlpExporter)   |
//!   |     |              |   |                       |   |                   |
//!   | SDK | Tracer.start |   +-----------------------+   +-------------------+
//!   |     | Span.end()   |
//!   +-----+--------------+
//! ```
//!
//! [`TracerProvider`]: crate::trace::TracerProvider
use crate::context::Context;
use crate::error::{SdkError, SdkResult};
use crate::export::{
    retry_with_exponential_backoff, AtomicPipelineState, PipelineState, RetryPolicy,
};
use crate::resource::Resource;
use crate::trace::{Span, SpanData, SpanExporter};
use crate::{beacon_debug, beacon_error, beacon_warn};
use futures_executor::block_on;
use std::cmp::min;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use std::{env, fmt, str::FromStr, thread};

/// Delay interval between two consecutive exports.
pub(crate) const OTEL_BSP_SCHEDULE_DELAY: &str = "OTEL_BSP_SCHEDULE_DELAY";
/// Default delay interval between two consecutive exports.
pub(crate) const OTEL_BSP_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum queue size
pub(crate) const OTEL_BSP_MAX_QUEUE_SIZE: &str = "OTEL_BSP_MAX_QUEUE_SIZE";
/// Default maximum queue size
pub(crate) const OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to OTEL_BSP_MAX_QUEUE_SIZE
pub(crate) const OTEL_BSP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BSP_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size
pub(crate) const OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;
/// Maximum allowed time to export data.
pub(crate) const OTEL_BSP_EXPORT_TIMEOUT: &str = "OTEL_BSP_EXPORT_TIMEOUT";
/// Default maximum allowed time to export data.
pub(crate) const OTEL_BSP_EXPORT_TIMEOUT_DEFAULT: u64 = 30_000;

const CONTROL_CHANNEL_CAPACITY: usize = 64;

/// `SpanProcessor` is an interface which allows hooks for span start and end
/// method invocations.
pub trait SpanProcessor: Send + Sync + fmt::Debug {
    /// `on_start` is called when a `Span` is started. It runs synchronously on
    /// the thread that started the span, therefore it should not block.
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    /// `on_end` is called after a `Span` is ended. It runs synchronously within
    /// `Span::end`, therefore it should not block.
    fn on_end(&self, span: SpanData);

    /// Force the spans lying in the cache to be exported.
    fn force_flush(&self) -> SdkResult<()>;

    /// Shuts down the processor, flushing what it still holds within `timeout`.
    ///
    /// Implementations must tolerate being called more than once.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()>;

    /// Shuts down the processor with a 5 second timeout.
    fn shutdown(&self) -> SdkResult<()> {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// Set the resource for the processor.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// A [SpanProcessor] that passes finished spans to the configured
/// `SpanExporter` as soon as they are finished, without any batching.
///
/// The export blocks the thread ending the span, which makes this processor
/// useful for debugging and testing only. Use [BatchSpanProcessor] otherwise.
#[derive(Debug)]
pub struct SimpleSpanProcessor<E> {
    exporter: Mutex<E>,
}

impl<E: SpanExporter> SimpleSpanProcessor<E> {
    /// Create a new [SimpleSpanProcessor] using the provided exporter.
    pub fn new(exporter: E) -> Self {
        Self {
            exporter: Mutex::new(exporter),
        }
    }
}

impl<E: SpanExporter> SpanProcessor for SimpleSpanProcessor<E> {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }

        let result = self
            .exporter
            .lock()
            .map_err(SdkError::from)
            .and_then(|exporter| block_on(exporter.export(std::slice::from_ref(&span))));

        if let Err(err) = result {
            beacon_debug!(
                name: "SimpleSpanProcessor.OnEnd.Error",
                reason = format!("{err:?}")
            );
        }
    }

    fn force_flush(&self) -> SdkResult<()> {
        self.exporter.lock()?.force_flush()
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult<()> {
        self.exporter.lock()?.shutdown()
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.set_resource(resource);
        }
    }
}

#[derive(Debug)]
enum BatchMessage {
    /// The span queue reached the export batch size.
    ExportSpans,
    ForceFlush(SyncSender<SdkResult<()>>),
    Shutdown(SyncSender<SdkResult<()>>),
    SetResource(Arc<Resource>),
}

/// A [`SpanProcessor`] that buffers finished spans and exports them in batches
/// from a dedicated thread.
///
/// Ending a span only pushes it into a bounded queue with `try_send`, so it
/// never blocks. When the queue is full the newest span is dropped and
/// counted. The worker exports when the queue holds a full batch or when the
/// scheduled delay elapses, whichever happens first. Failed exports are
/// retried according to the configured [`RetryPolicy`], after which the batch
/// is logged and dropped. Shutdown exports what is left once, without retries.
///
/// ```
/// use beacon_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, InMemorySpanExporter, TracerProvider};
/// use std::time::Duration;
///
/// let exporter = InMemorySpanExporter::default();
/// let processor = BatchSpanProcessor::builder(exporter)
///     .with_batch_config(
///         BatchConfigBuilder::default()
///             .with_scheduled_delay(Duration::from_millis(100))
///             .build(),
///     )
///     .build();
/// let provider = TracerProvider::builder().with_span_processor(processor).build();
/// # provider.shutdown().unwrap();
/// ```
pub struct BatchSpanProcessor {
    span_sender: SyncSender<SpanData>,
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    forceflush_timeout: Duration,
    max_export_batch_size: usize,
    max_queue_size: usize,
    state: Arc<AtomicPipelineState>,
    dropped_span_count: AtomicUsize,
    current_batch_size: Arc<AtomicUsize>,
    export_span_message_sent: Arc<AtomicBool>,
}

impl fmt::Debug for BatchSpanProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSpanProcessor")
            .field("state", &self.state.load())
            .field("dropped_span_count", &self.dropped_span_count)
            .finish()
    }
}

impl BatchSpanProcessor {
    /// Creates a new processor and starts its worker thread.
    ///
    /// Panics if the operating system refuses to spawn the thread.
    pub fn new<E>(mut exporter: E, config: BatchConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        let (span_sender, span_receiver) = sync_channel::<SpanData>(config.max_queue_size);
        let (message_sender, message_receiver) =
            sync_channel::<BatchMessage>(CONTROL_CHANNEL_CAPACITY);
        let state = Arc::new(AtomicPipelineState::new());
        let current_batch_size = Arc::new(AtomicUsize::new(0));
        let export_span_message_sent = Arc::new(AtomicBool::new(false));

        let worker = BatchWorker {
            span_receiver,
            current_batch_size: current_batch_size.clone(),
            config,
            spans: Vec::new(),
        };
        let (worker_state, worker_message_sent) = (state.clone(), export_span_message_sent.clone());
        let max_export_batch_size = worker.config.max_export_batch_size;
        let max_queue_size = worker.config.max_queue_size;
        let forceflush_timeout = worker.config.max_export_timeout;

        let handle = thread::Builder::new()
            .name("BatchSpanProcessorThread".to_string())
            .spawn(move || {
                worker_state.advance(PipelineState::Running);
                worker.run(
                    &mut exporter,
                    message_receiver,
                    &worker_state,
                    &worker_message_sent,
                );
                worker_state.advance(PipelineState::Stopped);
                beacon_debug!(name: "BatchSpanProcessor.ThreadStopped");
            })
            .expect("failed to spawn the batch span processor thread");

        BatchSpanProcessor {
            span_sender,
            message_sender,
            handle: Mutex::new(Some(handle)),
            forceflush_timeout,
            max_export_batch_size,
            max_queue_size,
            state,
            dropped_span_count: AtomicUsize::new(0),
            current_batch_size,
            export_span_message_sent,
        }
    }

    /// Create a new batch processor builder.
    pub fn builder<E>(exporter: E) -> BatchSpanProcessorBuilder<E>
    where
        E: SpanExporter + 'static,
    {
        BatchSpanProcessorBuilder {
            exporter,
            config: BatchConfig::default(),
        }
    }

    /// Current lifecycle state of the export pipeline.
    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    /// Number of spans dropped so far because the queue was full or closed.
    pub fn dropped_spans(&self) -> usize {
        self.dropped_span_count.load(Ordering::Relaxed)
    }

    fn send_control(&self, message: BatchMessage) -> SdkResult<()> {
        self.message_sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => {
                SdkError::InternalFailure("control channel of the span processor is full".into())
            }
            TrySendError::Disconnected(_) => {
                SdkError::InternalFailure("span processor thread is not running".into())
            }
        })
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if self.state.load() >= PipelineState::ShuttingDown {
            beacon_debug!(
                name: "BatchSpanProcessor.OnEnd.AfterShutdown",
                span_name = span.name.to_string()
            );
            return;
        }

        // counted before the send so the worker never sees more spans than the counter
        let queued = self.current_batch_size.fetch_add(1, Ordering::Relaxed) + 1;
        match self.span_sender.try_send(span) {
            Ok(()) => {
                if queued >= self.max_export_batch_size
                    && !self.export_span_message_sent.swap(true, Ordering::Relaxed)
                {
                    // a full batch is waiting; wake the worker before the timer does
                    if self.message_sender.try_send(BatchMessage::ExportSpans).is_err() {
                        self.export_span_message_sent.store(false, Ordering::Relaxed);
                    }
                }
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.current_batch_size.fetch_sub(1, Ordering::Relaxed);
                // The first time a span is dropped, emit a warning. The total
                // is reported at shutdown.
                if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
                    beacon_warn!(
                        name: "BatchSpanProcessor.SpanDroppingStarted",
                        message = "Dropped a span because the queue is full. The total count is reported at shutdown."
                    );
                }
            }
        }
    }

    fn force_flush(&self) -> SdkResult<()> {
        if self.state.load() >= PipelineState::ShuttingDown {
            return Err(SdkError::AlreadyShutdown);
        }
        let (sender, receiver) = sync_channel(1);
        self.send_control(BatchMessage::ForceFlush(sender))?;

        receiver
            .recv_timeout(self.forceflush_timeout)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => SdkError::ShutdownTimeout(self.forceflush_timeout),
                RecvTimeoutError::Disconnected => {
                    SdkError::InternalFailure("span processor thread exited".into())
                }
            })?
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult<()> {
        if self.state.advance(PipelineState::ShuttingDown) >= PipelineState::ShuttingDown {
            beacon_debug!(name: "BatchSpanProcessor.AlreadyShutdown");
            return Ok(());
        }

        let dropped_spans = self.dropped_spans();
        if dropped_spans > 0 {
            beacon_warn!(
                name: "BatchSpanProcessor.SpansDropped",
                dropped_span_count = dropped_spans,
                max_queue_size = self.max_queue_size
            );
        }

        let (sender, receiver) = sync_channel(1);
        self.send_control(BatchMessage::Shutdown(sender))?;

        match receiver.recv_timeout(timeout) {
            Ok(result) => {
                if let Some(handle) = self.handle.lock()?.take() {
                    if handle.join().is_err() {
                        return Err(SdkError::InternalFailure(
                            "span processor thread panicked".into(),
                        ));
                    }
                }
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                beacon_error!(
                    name: "BatchSpanProcessor.ShutdownTimeout",
                    timeout_ms = timeout.as_millis() as u64
                );
                Err(SdkError::ShutdownTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SdkError::InternalFailure(
                "span processor thread exited before shutdown completed".into(),
            )),
        }
    }

    fn set_resource(&mut self, resource: &Resource) {
        let _ = self.send_control(BatchMessage::SetResource(Arc::new(resource.clone())));
    }
}

/// State owned by the worker thread.
struct BatchWorker {
    span_receiver: Receiver<SpanData>,
    current_batch_size: Arc<AtomicUsize>,
    config: BatchConfig,
    spans: Vec<SpanData>,
}

impl BatchWorker {
    fn run<E: SpanExporter>(
        mut self,
        exporter: &mut E,
        messages: Receiver<BatchMessage>,
        state: &AtomicPipelineState,
        export_span_message_sent: &AtomicBool,
    ) {
        let retry_policy = self.config.retry_policy;
        let mut last_export_time = Instant::now();
        loop {
            let timeout = self
                .config
                .scheduled_delay
                .saturating_sub(last_export_time.elapsed());
            match messages.recv_timeout(timeout) {
                Ok(BatchMessage::ExportSpans) => {
                    let _ = self.export_pending(exporter, &retry_policy, false);
                    export_span_message_sent.store(false, Ordering::Relaxed);
                    last_export_time = Instant::now();
                }
                Ok(BatchMessage::ForceFlush(sender)) => {
                    let result = self.export_pending(exporter, &retry_policy, true);
                    let _ = sender.send(result);
                    last_export_time = Instant::now();
                }
                Ok(BatchMessage::Shutdown(sender)) => {
                    state.advance(PipelineState::ShuttingDown);
                    let result = self.finish(exporter);
                    let _ = sender.send(result);
                    break;
                }
                Ok(BatchMessage::SetResource(resource)) => exporter.set_resource(&resource),
                Err(RecvTimeoutError::Timeout) => {
                    let _ = self.export_pending(exporter, &retry_policy, true);
                    last_export_time = Instant::now();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // processor dropped without shutdown
                    state.advance(PipelineState::ShuttingDown);
                    let _ = self.finish(exporter);
                    break;
                }
            }
        }
    }

    /// One last export without retries, then the exporter is shut down.
    fn finish<E: SpanExporter>(&mut self, exporter: &mut E) -> SdkResult<()> {
        let result = self.export_pending(exporter, &RetryPolicy::none(), true);
        let shutdown = exporter.shutdown();
        result.and(shutdown)
    }

    /// Exports the queued spans in batches of at most `max_export_batch_size`.
    ///
    /// Unless `drain` is set, only full batches are exported. Returns the last
    /// export error, if any.
    fn export_pending<E: SpanExporter>(
        &mut self,
        exporter: &E,
        policy: &RetryPolicy,
        drain: bool,
    ) -> SdkResult<()> {
        let mut result = Ok(());
        loop {
            while self.spans.len() < self.config.max_export_batch_size {
                match self.span_receiver.try_recv() {
                    Ok(span) => self.spans.push(span),
                    Err(_) => break,
                }
            }
            let full = self.spans.len() >= self.config.max_export_batch_size;
            if self.spans.is_empty() || (!full && !drain) {
                return result;
            }

            let count = self.spans.len();
            self.current_batch_size.fetch_sub(count, Ordering::Relaxed);
            let spans = &self.spans;
            let export = retry_with_exponential_backoff(policy, "BatchSpanProcessor.Export", || {
                block_on(exporter.export(spans))
            });
            if let Err(err) = export {
                beacon_error!(
                    name: "BatchSpanProcessor.ExportFailed",
                    dropped_span_count = count,
                    error = format!("{err}")
                );
                result = Err(err);
            }
            self.spans.clear();

            if !full {
                return result;
            }
        }
    }
}

/// Configures a [`BatchSpanProcessor`] before its worker thread starts.
#[derive(Debug)]
pub struct BatchSpanProcessorBuilder<E> {
    exporter: E,
    config: BatchConfig,
}

impl<E> BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    /// Replaces the [`BatchConfig`] read from the environment.
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchSpanProcessorBuilder { config, ..self }
    }

    /// Starts the worker thread.
    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::new(self.exporter, self.config)
    }
}

/// Queue, batching and retry settings of a [`BatchSpanProcessor`], built with
/// [`BatchConfigBuilder`].
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Spans waiting for export; further spans are dropped.
    pub(crate) max_queue_size: usize,
    /// Timer between two exports.
    pub(crate) scheduled_delay: Duration,
    /// Spans per export call, at most `max_queue_size`.
    pub(crate) max_export_batch_size: usize,
    /// Force flush budget.
    pub(crate) max_export_timeout: Duration,
    pub(crate) retry_policy: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

/// Builds a [`BatchConfig`].
///
/// The default builder reads `OTEL_BSP_MAX_QUEUE_SIZE`,
/// `OTEL_BSP_SCHEDULE_DELAY`, `OTEL_BSP_MAX_EXPORT_BATCH_SIZE` and
/// `OTEL_BSP_EXPORT_TIMEOUT` (milliseconds); unparsable values are ignored.
/// The `with_*` methods take precedence over the environment.
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
    max_export_timeout: Duration,
    retry_policy: RetryPolicy,
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        let millis = |name, default| Duration::from_millis(env_value(name).unwrap_or(default));
        BatchConfigBuilder {
            max_queue_size: env_value(OTEL_BSP_MAX_QUEUE_SIZE)
                .unwrap_or(OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT),
            scheduled_delay: millis(OTEL_BSP_SCHEDULE_DELAY, OTEL_BSP_SCHEDULE_DELAY_DEFAULT),
            max_export_batch_size: env_value(OTEL_BSP_MAX_EXPORT_BATCH_SIZE)
                .unwrap_or(OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT),
            max_export_timeout: millis(OTEL_BSP_EXPORT_TIMEOUT, OTEL_BSP_EXPORT_TIMEOUT_DEFAULT),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl BatchConfigBuilder {
    /// Bound of the span queue, 2048 by default.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Spans per export call, 512 by default. A queue holding more is drained
    /// in consecutive calls.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Timer between two exports, 5s by default.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// How long `force_flush` waits, 30s by default.
    pub fn with_max_export_timeout(mut self, max_export_timeout: Duration) -> Self {
        self.max_export_timeout = max_export_timeout;
        self
    }

    /// Retries of failed exports, three by default.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Both sizes end up at least 1, and the batch size never exceeds the
    /// queue size.
    pub fn build(self) -> BatchConfig {
        let max_queue_size = self.max_queue_size.max(1);
        BatchConfig {
            max_queue_size,
            scheduled_delay: self.scheduled_delay,
            max_export_batch_size: min(self.max_export_batch_size, max_queue_size).max(1),
            max_export_timeout: self.max_export_timeout,
            retry_policy: self.retry_policy,
        }
    }
}
